/// JSON-over-Unix-socket bridge exposing the dict operations.
pub mod bridge;
/// Runtime configuration loading.
pub mod config;
/// Hash table algorithms: the CPython 3.2 dict, the parallel-array
/// teaching table, and the probing-sequence generator.
pub mod engine;
/// Common error types: hashing, engine operations, bridge protocol.
pub mod error;
/// CPython hashing for the supported key types.
pub mod hashing;
/// Console logging setup.
pub mod logging;
/// Modeled Python values and table slots.
pub mod object;
/// Breakpoint trace recording.
pub mod trace;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use config::Settings;
pub use engine::{
    generate_links, Dict32, DictSnapshot, LinksOutcome, ProbingAlgorithm, ProbingSnapshot,
    SimpleTable, INITIAL_SIZE, PERTURB_SHIFT,
};
pub use error::{BridgeError, BridgeResult, EngineError, EngineResult, HashError};
pub use hashing::{py_hash, HashCode, NONE_HASH};
pub use object::{PyValue, Slot, SlotKey};
pub use trace::{Breakpoint, Trace};
