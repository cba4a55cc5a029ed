pub mod data;
pub mod error;
pub mod inbreeding;
pub mod pedigree;
pub mod traversal;
pub mod types;

pub use error::{PedigreeError, Result};
