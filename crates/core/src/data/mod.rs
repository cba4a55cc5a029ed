pub mod registry;

pub use registry::{read_bull_registry, read_cow_registry, BullRow, CowRow};
