/// Animal identifier type used throughout the library.
///
/// Canonical registration numbers are used as graph keys; breeder-code
/// (NAAB) identifiers are translated on the way in by the id resolver.
pub type AnimalId = String;

/// Default ancestor-search depth, in generations, applied by the
/// inbreeding engine when no explicit depth is configured.
pub const DEFAULT_MAX_GENERATIONS: usize = 6;

/// Number of processed records between build progress callbacks.
pub const BUILD_PROGRESS_INTERVAL: usize = 1000;
