// Pedigree store - id resolution, graph arena, binary snapshot.

pub mod graph;
pub mod ids;
pub mod snapshot;

pub use graph::{virtual_dam_id, AnimalNode, MergeOutcome, NodeKind, PedigreeGraph};
pub use ids::{is_breeder_code, IdResolver};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot};
