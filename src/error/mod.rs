pub mod bridge;
pub mod engine;

pub use bridge::{BridgeError, BridgeResult};
pub use engine::{EngineError, EngineResult, HashError};
