pub mod slot;
pub mod value;

pub use slot::{Slot, SlotKey};
pub use value::PyValue;
