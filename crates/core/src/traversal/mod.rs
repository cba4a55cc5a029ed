// Ancestor traversal - bounded breadth-first enumeration and
// common-ancestor resolution over the pedigree graph.

pub mod common;
pub mod paths;

pub use common::{is_valid_path_pair, resolve_common_ancestors, CommonAncestor};
pub use paths::{enumerate_ancestors, AncestorPath, AncestorPathMap, PathCache};
