use crate::traversal::paths::{AncestorPath, AncestorPathMap};
use crate::types::AnimalId;

/// A shared ancestor of two mating candidates, carrying every retained
/// route from each side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAncestor {
    pub ancestor_id: AnimalId,
    pub sire_side_paths: Vec<AncestorPath>,
    pub dam_side_paths: Vec<AncestorPath>,
}

impl CommonAncestor {
    /// Cross-product of the two path sets, filtered down to the pairs that
    /// form a genuine diamond (see [`is_valid_path_pair`]). Invalid pairs
    /// are dropped without logging; they are expected whenever an ancestor
    /// is reachable through overlapping routes.
    pub fn valid_path_pairs(
        &self,
        sire_id: &str,
        dam_id: &str,
    ) -> Vec<(&AncestorPath, &AncestorPath)> {
        let mut pairs = Vec::new();
        for sire_path in &self.sire_side_paths {
            for dam_path in &self.dam_side_paths {
                if is_valid_path_pair(&self.ancestor_id, sire_path, dam_path, sire_id, dam_id) {
                    pairs.push((sire_path, dam_path));
                }
            }
        }
        pairs
    }
}

/// Resolve the common ancestors of two candidates from their enumerated
/// ancestor maps.
///
/// The direct cases come first: a candidate that appears in the other's
/// ancestor map is itself a common ancestor, with a zero-length path on
/// its own side. The id-set intersection follows, in sire-side discovery
/// order. A start animal never appears in its own map, so a direct case
/// cannot show up a second time through the intersection.
pub fn resolve_common_ancestors(
    sire_id: &str,
    dam_id: &str,
    sire_map: &AncestorPathMap,
    dam_map: &AncestorPathMap,
) -> Vec<CommonAncestor> {
    let mut found = Vec::new();

    if let Some(paths) = dam_map.get(sire_id) {
        found.push(CommonAncestor {
            ancestor_id: sire_id.to_string(),
            sire_side_paths: vec![AncestorPath::empty()],
            dam_side_paths: paths.clone(),
        });
    }
    if let Some(paths) = sire_map.get(dam_id) {
        found.push(CommonAncestor {
            ancestor_id: dam_id.to_string(),
            sire_side_paths: paths.clone(),
            dam_side_paths: vec![AncestorPath::empty()],
        });
    }

    for (ancestor, sire_paths) in sire_map {
        if let Some(dam_paths) = dam_map.get(ancestor) {
            found.push(CommonAncestor {
                ancestor_id: ancestor.clone(),
                sire_side_paths: sire_paths.clone(),
                dam_side_paths: dam_paths.clone(),
            });
        }
    }

    found
}

/// Whether a sire-side/dam-side path pair counts toward the coefficient.
///
/// Wright's method requires each pair to describe two independent routes
/// meeting only at the common ancestor:
///
/// 1. the paths share no id other than the ancestor itself;
/// 2. the sire-side path does not pass through the dam before reaching
///    the ancestor;
/// 3. the dam-side path does not pass through the sire;
/// 4. neither path repeats an id internally.
///
/// Rules 2 and 3 exclude the terminal position so that the direct
/// parent-offspring case, where the ancestor IS the other candidate,
/// stays valid.
pub fn is_valid_path_pair(
    ancestor_id: &str,
    sire_path: &AncestorPath,
    dam_path: &AncestorPath,
    sire_id: &str,
    dam_id: &str,
) -> bool {
    for id in sire_path.ids() {
        if id != ancestor_id && dam_path.contains(id) {
            return false;
        }
    }
    if strip_terminal(sire_path).iter().any(|id| id == dam_id) {
        return false;
    }
    if strip_terminal(dam_path).iter().any(|id| id == sire_id) {
        return false;
    }
    !sire_path.has_duplicate() && !dam_path.has_duplicate()
}

fn strip_terminal(path: &AncestorPath) -> &[AnimalId] {
    let ids = path.ids();
    match ids.len() {
        0 => ids,
        n => &ids[..n - 1],
    }
}
