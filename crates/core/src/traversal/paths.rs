use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::pedigree::PedigreeGraph;
use crate::types::AnimalId;

/// One route from an animal to an ancestor.
///
/// The sequence starts immediately after the query animal and ends at the
/// ancestor inclusive, so its length equals the number of generational
/// links. The empty path stands for the zero-length leg used when a mating
/// candidate is itself the common ancestor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorPath {
    ids: Vec<AnimalId>,
}

impl AncestorPath {
    pub fn new(ids: Vec<AnimalId>) -> Self {
        Self { ids }
    }

    /// The zero-length leg.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of generational links covered by this path.
    pub fn links(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The terminal ancestor id, or `None` for the zero-length leg.
    pub fn ancestor(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn ids(&self) -> &[AnimalId] {
        &self.ids
    }

    /// Whether any id occurs more than once within the path.
    pub fn has_duplicate(&self) -> bool {
        for (i, id) in self.ids.iter().enumerate() {
            if self.ids[i + 1..].contains(id) {
                return true;
            }
        }
        false
    }
}

/// All ancestors of one animal, keyed by ancestor id in discovery order,
/// with every distinct route retained.
pub type AncestorPathMap = IndexMap<AnimalId, Vec<AncestorPath>>;

/// Enumerate every ancestor path of `start_id` up to `max_generations`
/// links, breadth first.
///
/// Distinct routes to the same ancestor are all recorded; discovery order
/// is deterministic (shortest routes first). An id already on the running
/// path is never expanded again, so an anomalous pedigree loop terminates
/// with a warning instead of recursing. Parent ids referenced by a node
/// but absent from the graph still count as ancestors; they are simply
/// not expandable.
pub fn enumerate_ancestors(
    graph: &PedigreeGraph,
    start_id: &str,
    max_generations: usize,
) -> AncestorPathMap {
    let start: AnimalId = graph.canonical_id(start_id).to_string();
    let mut buckets: AncestorPathMap = IndexMap::new();

    let mut queue: VecDeque<(AnimalId, Vec<AnimalId>, usize)> = VecDeque::new();
    queue.push_back((start.clone(), Vec::new(), 0));

    while let Some((current, mut path, generation)) = queue.pop_front() {
        // Guard at dequeue as well as at enqueue: entries queued before a
        // loop was detectable must still not revisit an id.
        if path.contains(&current) {
            log::warn!(
                "pedigree loop at '{}' while enumerating ancestors of '{}'; dropping the branch",
                current,
                start
            );
            continue;
        }
        path.push(current.clone());

        if current != start {
            // Everything after the start animal, ancestor inclusive.
            buckets
                .entry(current.clone())
                .or_default()
                .push(AncestorPath::new(path[1..].to_vec()));
        }

        if generation < max_generations {
            if let Some(node) = graph.node(&current) {
                for parent in [node.sire_id.as_deref(), node.dam_id.as_deref()]
                    .into_iter()
                    .flatten()
                {
                    if !path.iter().any(|id| id == parent) {
                        queue.push_back((parent.to_string(), path.clone(), generation + 1));
                    }
                }
            }
        }
    }

    buckets
}

/// Shared cache of enumerated ancestor maps, keyed by canonical id and
/// search depth.
///
/// Results are handed out behind `Arc`, so callers can hold a map across
/// later queries. A poisoned lock degrades to recomputation instead of
/// panicking. The cache must be invalidated whenever the graph it was
/// computed from is replaced.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: Mutex<HashMap<(AnimalId, usize), Arc<AncestorPathMap>>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached ancestor map for `id` at `max_generations`, computing it on
    /// first request.
    pub fn ancestors_of(
        &self,
        graph: &PedigreeGraph,
        id: &str,
        max_generations: usize,
    ) -> Arc<AncestorPathMap> {
        let key = (graph.canonical_id(id).to_string(), max_generations);

        if let Ok(entries) = self.entries.lock() {
            if let Some(found) = entries.get(&key) {
                return Arc::clone(found);
            }
        }

        let computed = Arc::new(enumerate_ancestors(graph, &key.0, max_generations));

        if let Ok(mut entries) = self.entries.lock() {
            return Arc::clone(entries.entry(key).or_insert_with(|| Arc::clone(&computed)));
        }
        computed
    }

    /// Number of cached maps.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached map. Must be called after a graph rebuild.
    pub fn invalidate(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
