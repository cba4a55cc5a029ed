use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{BullRow, CowRow};
use crate::pedigree::ids::IdResolver;
use crate::types::{AnimalId, BUILD_PROGRESS_INTERVAL};

/// How a node entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Built from a bull registry row.
    Bull,
    /// Built from a cow herd row.
    Cow,
    /// Synthesized from indirect evidence (grandparent links in another
    /// animal's row). The id may be synthetic (a bull's placeholder dam) or
    /// a real registration id known only through a daughter's row.
    Virtual,
}

/// A single animal in the pedigree graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalNode {
    /// Canonical id (or synthetic placeholder id).
    pub id: AnimalId,
    pub kind: NodeKind,
    /// Canonical sire id, or `None` if unknown.
    pub sire_id: Option<AnimalId>,
    /// Canonical dam id, or `None` if unknown.
    pub dam_id: Option<AnimalId>,
    /// Self-reported inbreeding as a percentage in [0, 100]. Authoritative
    /// when present: the engine uses it instead of path enumeration.
    pub reported_inbreeding_pct: Option<f64>,
}

/// Counts reported by [`PedigreeGraph::merge_cow_rows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// New cow nodes inserted.
    pub inserted: usize,
    /// Placeholder nodes upgraded in place to real cows.
    pub upgraded: usize,
    /// Existing real nodes that only had a missing reported value filled.
    pub enriched: usize,
}

/// Synthetic id of the placeholder dam of `of`.
///
/// `#` cannot occur in registration ids, so synthetic ids never collide
/// with real ones. The rule chains: the placeholder maternal grandam of a
/// bull is `virtual_dam_id(virtual_dam_id(bull))`.
pub fn virtual_dam_id(of: &str) -> AnimalId {
    format!("{}#dam", of)
}

/// Flat pedigree graph keyed by canonical animal id.
///
/// Built once from the bull registry, optionally overlaid with cow herd
/// rows, then treated as read-only: traversal and coefficient computation
/// never mutate it, and a registry refresh rebuilds it wholesale.
///
/// Bull records carry no direct dam id, only the maternal grandsire and
/// great-grandsire. When either link is present, build synthesizes two
/// placeholder nodes (the dam and the maternal grandam) so the
/// three-generation maternal chain stays representable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PedigreeGraph {
    /// Arena of nodes in insertion order.
    nodes: IndexMap<AnimalId, AnimalNode>,
    /// Breeder-code aliases registered from the bull registry.
    aliases: IdResolver,
}

impl PedigreeGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes (real and virtual).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of virtual placeholder nodes.
    pub fn n_virtual(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| n.kind == NodeKind::Virtual)
            .count()
    }

    /// Resolve an id to its canonical form via the alias map.
    pub fn canonical_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.aliases.canonical(id)
    }

    /// Look up a node by id. Breeder codes resolve to their canonical id
    /// first, so either form finds the same node.
    pub fn node(&self, id: &str) -> Option<&AnimalNode> {
        self.nodes.get(self.aliases.canonical(id))
    }

    /// Whether an id (in either form) has a node.
    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Canonical sire id of an animal, if known.
    pub fn sire_of(&self, id: &str) -> Option<&str> {
        self.node(id)?.sire_id.as_deref()
    }

    /// Canonical dam id of an animal, if known.
    pub fn dam_of(&self, id: &str) -> Option<&str> {
        self.node(id)?.dam_id.as_deref()
    }

    /// The alias resolver built from the bull registry.
    pub fn resolver(&self) -> &IdResolver {
        &self.aliases
    }

    /// Iterate over all nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AnimalNode> {
        self.nodes.values()
    }

    /// Build a graph from bull registry rows.
    ///
    /// Equivalent to [`PedigreeGraph::from_bull_rows_with_progress`] with a
    /// no-op callback.
    pub fn from_bull_rows(rows: &[BullRow]) -> Self {
        Self::from_bull_rows_with_progress(rows, |_, _| {})
    }

    /// Build a graph from bull registry rows, reporting progress.
    ///
    /// The callback receives `(processed, total)` every
    /// [`BUILD_PROGRESS_INTERVAL`] records and once at completion. It is
    /// informational only; a running build cannot be cancelled.
    ///
    /// Rows are processed in two passes: breeder codes are registered
    /// first so parent references normalize regardless of which id form a
    /// row uses. A duplicate registration id keeps the first row; a parent
    /// link pointing at the animal itself is dropped; an out-of-range
    /// reported inbreeding percentage is discarded. All three are logged,
    /// none aborts the build.
    pub fn from_bull_rows_with_progress(
        rows: &[BullRow],
        mut progress: impl FnMut(usize, usize),
    ) -> Self {
        let mut graph = Self::new();

        for row in rows {
            if let Some(code) = &row.naab_code {
                graph.aliases.register(code, &row.reg_id);
            }
        }

        let total = rows.len();
        for (i, row) in rows.iter().enumerate() {
            graph.insert_bull(row);
            if (i + 1) % BUILD_PROGRESS_INTERVAL == 0 {
                progress(i + 1, total);
            }
        }
        if total % BUILD_PROGRESS_INTERVAL != 0 {
            progress(total, total);
        }

        graph
    }

    fn insert_bull(&mut self, row: &BullRow) {
        let id = row.reg_id.clone();
        if self.nodes.contains_key(&id) {
            log::warn!("duplicate registry row for '{}'; keeping the first", id);
            return;
        }

        let sire_id = self.normalized_parent(&id, row.sire_id.as_deref());
        let mgs_id = self.normalized_parent(&id, row.mgs_id.as_deref());
        let mmgs_id = self.normalized_parent(&id, row.mmgs_id.as_deref());

        // The dam side of a bull record is always indirect. When any
        // maternal link is present, both placeholders are synthesized so
        // the maternal chain keeps its three-generation shape.
        let dam_id = if mgs_id.is_some() || mmgs_id.is_some() {
            let dam = virtual_dam_id(&id);
            let grandam = virtual_dam_id(&dam);
            self.nodes.insert(
                grandam.clone(),
                AnimalNode {
                    id: grandam.clone(),
                    kind: NodeKind::Virtual,
                    sire_id: mmgs_id,
                    dam_id: None,
                    reported_inbreeding_pct: None,
                },
            );
            self.nodes.insert(
                dam.clone(),
                AnimalNode {
                    id: dam.clone(),
                    kind: NodeKind::Virtual,
                    sire_id: mgs_id,
                    dam_id: Some(grandam),
                    reported_inbreeding_pct: None,
                },
            );
            Some(dam)
        } else {
            None
        };

        let reported = validate_reported_pct(&id, row.genomic_inbreeding_pct);
        self.nodes.insert(
            id.clone(),
            AnimalNode {
                id,
                kind: NodeKind::Bull,
                sire_id,
                dam_id,
                reported_inbreeding_pct: reported,
            },
        );
    }

    /// Overlay cow herd rows onto a graph built from the bull registry.
    ///
    /// Precedence per cow id:
    /// - an existing real node is never overwritten (bull-sourced lineage
    ///   wins); only a missing reported inbreeding value is filled in;
    /// - an existing virtual placeholder is upgraded in place to the cow's
    ///   sire/dam/reported data, keeping its identity;
    /// - an unknown id is inserted as a new cow node.
    ///
    /// A referenced dam without a node of her own is inserted as a virtual
    /// placeholder carrying the row's grandsire links, so a later row for
    /// her upgrades it in place.
    pub fn merge_cow_rows(&mut self, rows: &[CowRow]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for row in rows {
            self.merge_cow(row, &mut outcome);
        }
        outcome
    }

    fn merge_cow(&mut self, row: &CowRow, outcome: &mut MergeOutcome) {
        let id = row.cow_id.clone();
        let sire_id = self.normalized_parent(&id, row.sire_id.as_deref());
        let dam_id = self.normalized_parent(&id, row.dam_id.as_deref());
        let mgs_id = self.normalized_parent(&id, row.mgs_id.as_deref());
        let mmgs_id = self.normalized_parent(&id, row.mmgs_id.as_deref());
        let reported = validate_reported_pct(&id, row.reported_inbreeding_pct);

        if let Some(node) = self.nodes.get_mut(&id) {
            if node.kind != NodeKind::Virtual {
                if node.reported_inbreeding_pct.is_none() && reported.is_some() {
                    node.reported_inbreeding_pct = reported;
                    outcome.enriched += 1;
                }
                // The row's lineage was not applied, so no dam synthesis.
                return;
            }
            node.kind = NodeKind::Cow;
            node.sire_id = sire_id;
            node.dam_id = dam_id.clone();
            node.reported_inbreeding_pct = reported;
            outcome.upgraded += 1;
        } else {
            self.nodes.insert(
                id.clone(),
                AnimalNode {
                    id,
                    kind: NodeKind::Cow,
                    sire_id,
                    dam_id: dam_id.clone(),
                    reported_inbreeding_pct: reported,
                },
            );
            outcome.inserted += 1;
        }

        // Dam-side synthesis from the row's grandsire columns.
        let Some(dam) = dam_id else {
            return;
        };
        if !self.nodes.contains_key(&dam) {
            let grandam_id = mmgs_id.as_ref().map(|_| virtual_dam_id(&dam));
            if let Some(grandam) = &grandam_id {
                self.nodes.insert(
                    grandam.clone(),
                    AnimalNode {
                        id: grandam.clone(),
                        kind: NodeKind::Virtual,
                        sire_id: mmgs_id,
                        dam_id: None,
                        reported_inbreeding_pct: None,
                    },
                );
            }
            self.nodes.insert(
                dam.clone(),
                AnimalNode {
                    id: dam.clone(),
                    kind: NodeKind::Virtual,
                    sire_id: mgs_id,
                    dam_id: grandam_id,
                    reported_inbreeding_pct: None,
                },
            );
        } else if let Some(node) = self.nodes.get_mut(&dam) {
            // Only fill a gap on an existing placeholder; never rewrite.
            if node.kind == NodeKind::Virtual && node.sire_id.is_none() {
                node.sire_id = mgs_id;
            }
        }
    }

    fn normalized_parent(&self, child: &str, parent: Option<&str>) -> Option<AnimalId> {
        let parent = self.aliases.canonical(parent?);
        if parent == child {
            log::warn!(
                "animal '{}' listed as its own ancestor; dropping the link",
                child
            );
            return None;
        }
        Some(parent.to_string())
    }
}

/// Validate a reported inbreeding percentage, discarding values outside
/// [0, 100] with a warning.
fn validate_reported_pct(id: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(pct) if (0.0..=100.0).contains(&pct) => Some(pct),
        Some(pct) => {
            log::warn!(
                "discarding out-of-range reported inbreeding {}% for '{}'",
                pct,
                id
            );
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bull(reg: &str, sire: Option<&str>, mgs: Option<&str>, mmgs: Option<&str>) -> BullRow {
        BullRow {
            reg_id: reg.to_string(),
            sire_id: sire.map(String::from),
            mgs_id: mgs.map(String::from),
            mmgs_id: mmgs.map(String::from),
            ..BullRow::default()
        }
    }

    fn cow(id: &str, sire: Option<&str>, dam: Option<&str>) -> CowRow {
        CowRow {
            cow_id: id.to_string(),
            sire_id: sire.map(String::from),
            dam_id: dam.map(String::from),
            ..CowRow::default()
        }
    }

    #[test]
    fn test_bull_build_synthesizes_maternal_chain() {
        let rows = vec![bull("B1", Some("S1"), Some("G1"), Some("GG1"))];
        let graph = PedigreeGraph::from_bull_rows(&rows);

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.n_virtual(), 2);

        let node = graph.node("B1").unwrap();
        assert_eq!(node.kind, NodeKind::Bull);
        assert_eq!(node.sire_id.as_deref(), Some("S1"));
        assert_eq!(node.dam_id.as_deref(), Some("B1#dam"));

        let dam = graph.node("B1#dam").unwrap();
        assert_eq!(dam.kind, NodeKind::Virtual);
        assert_eq!(dam.sire_id.as_deref(), Some("G1"));
        assert_eq!(dam.dam_id.as_deref(), Some("B1#dam#dam"));

        let grandam = graph.node("B1#dam#dam").unwrap();
        assert_eq!(grandam.kind, NodeKind::Virtual);
        assert_eq!(grandam.sire_id.as_deref(), Some("GG1"));
        assert_eq!(grandam.dam_id, None);
    }

    #[test]
    fn test_bull_without_maternal_links_gets_no_placeholders() {
        let rows = vec![bull("B1", Some("S1"), None, None)];
        let graph = PedigreeGraph::from_bull_rows(&rows);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.n_virtual(), 0);
        assert_eq!(graph.dam_of("B1"), None);
    }

    #[test]
    fn test_bull_with_only_mmgs_still_gets_both_placeholders() {
        let rows = vec![bull("B1", None, None, Some("GG1"))];
        let graph = PedigreeGraph::from_bull_rows(&rows);

        assert_eq!(graph.n_virtual(), 2);
        let dam = graph.node("B1#dam").unwrap();
        assert_eq!(dam.sire_id, None);
        assert_eq!(graph.sire_of("B1#dam#dam"), Some("GG1"));
    }

    #[test]
    fn test_out_of_range_reported_value_discarded() {
        let mut row = bull("B1", None, None, None);
        row.genomic_inbreeding_pct = Some(250.0);
        let graph = PedigreeGraph::from_bull_rows(&[row]);
        assert_eq!(graph.node("B1").unwrap().reported_inbreeding_pct, None);

        let mut row = bull("B2", None, None, None);
        row.genomic_inbreeding_pct = Some(4.5);
        let graph = PedigreeGraph::from_bull_rows(&[row]);
        assert_eq!(
            graph.node("B2").unwrap().reported_inbreeding_pct,
            Some(4.5)
        );
    }

    #[test]
    fn test_duplicate_registration_keeps_first_row() {
        let rows = vec![
            bull("B1", Some("S1"), None, None),
            bull("B1", Some("S2"), None, None),
        ];
        let graph = PedigreeGraph::from_bull_rows(&rows);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.sire_of("B1"), Some("S1"));
    }

    #[test]
    fn test_self_parent_link_dropped() {
        let rows = vec![bull("B1", Some("B1"), None, None)];
        let graph = PedigreeGraph::from_bull_rows(&rows);
        assert_eq!(graph.sire_of("B1"), None);
    }

    #[test]
    fn test_breeder_code_lookup_and_reference_normalization() {
        let mut sire = bull("JPH900", None, None, None);
        sire.naab_code = Some("007HO12345".to_string());
        // The second bull references his sire by breeder code.
        let son = bull("JPH001", Some("007HO12345"), None, None);

        let graph = PedigreeGraph::from_bull_rows(&[sire, son]);

        // Lookup works in either form.
        assert_eq!(graph.node("007HO12345").unwrap().id, "JPH900");
        // The stored link is canonical.
        assert_eq!(graph.sire_of("JPH001"), Some("JPH900"));
    }

    #[test]
    fn test_progress_callback_interval_and_completion() {
        let rows: Vec<BullRow> = (0..2500)
            .map(|i| bull(&format!("B{}", i), None, None, None))
            .collect();

        let mut calls = Vec::new();
        PedigreeGraph::from_bull_rows_with_progress(&rows, |done, total| {
            calls.push((done, total));
        });

        assert_eq!(calls, vec![(1000, 2500), (2000, 2500), (2500, 2500)]);
    }

    #[test]
    fn test_merge_inserts_new_cow() {
        let mut graph = PedigreeGraph::from_bull_rows(&[bull("S1", None, None, None)]);
        let outcome = graph.merge_cow_rows(&[cow("C1", Some("S1"), None)]);

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.upgraded, 0);
        let node = graph.node("C1").unwrap();
        assert_eq!(node.kind, NodeKind::Cow);
        assert_eq!(node.sire_id.as_deref(), Some("S1"));
    }

    #[test]
    fn test_merge_never_overwrites_real_node() {
        let mut graph = PedigreeGraph::from_bull_rows(&[bull("B1", Some("S1"), None, None)]);
        let mut row = cow("B1", Some("S2"), Some("D2"));
        row.reported_inbreeding_pct = Some(3.0);
        let outcome = graph.merge_cow_rows(&[row]);

        // Lineage untouched, missing reported value filled.
        assert_eq!(outcome.enriched, 1);
        let node = graph.node("B1").unwrap();
        assert_eq!(node.kind, NodeKind::Bull);
        assert_eq!(node.sire_id.as_deref(), Some("S1"));
        assert_eq!(node.dam_id, None);
        assert_eq!(node.reported_inbreeding_pct, Some(3.0));
    }

    #[test]
    fn test_merge_does_not_replace_existing_reported_value() {
        let mut row = bull("B1", None, None, None);
        row.genomic_inbreeding_pct = Some(5.0);
        let mut graph = PedigreeGraph::from_bull_rows(&[row]);

        let mut cow_row = cow("B1", None, None);
        cow_row.reported_inbreeding_pct = Some(9.0);
        let outcome = graph.merge_cow_rows(&[cow_row]);

        assert_eq!(outcome.enriched, 0);
        assert_eq!(
            graph.node("B1").unwrap().reported_inbreeding_pct,
            Some(5.0)
        );
    }

    #[test]
    fn test_merge_upgrades_virtual_dam_in_place() {
        // C1's row references dam D1, who has no node of her own yet and
        // is synthesized as a placeholder with sire G1.
        let mut graph = PedigreeGraph::new();
        let mut first = cow("C1", Some("S1"), Some("D1"));
        first.mgs_id = Some("G1".to_string());
        graph.merge_cow_rows(&[first]);

        let placeholder = graph.node("D1").unwrap();
        assert_eq!(placeholder.kind, NodeKind::Virtual);
        assert_eq!(placeholder.sire_id.as_deref(), Some("G1"));

        // D1's own row arrives later and upgrades the placeholder.
        let mut own = cow("D1", Some("S9"), Some("D9"));
        own.reported_inbreeding_pct = Some(1.5);
        let outcome = graph.merge_cow_rows(&[own]);

        assert_eq!(outcome.upgraded, 1);
        let node = graph.node("D1").unwrap();
        assert_eq!(node.kind, NodeKind::Cow);
        assert_eq!(node.sire_id.as_deref(), Some("S9"));
        assert_eq!(node.dam_id.as_deref(), Some("D9"));
        assert_eq!(node.reported_inbreeding_pct, Some(1.5));
    }

    #[test]
    fn test_merge_synthesizes_grandam_when_mmgs_known() {
        let mut graph = PedigreeGraph::new();
        let mut row = cow("C1", Some("S1"), Some("D1"));
        row.mgs_id = Some("G1".to_string());
        row.mmgs_id = Some("GG1".to_string());
        graph.merge_cow_rows(&[row]);

        let dam = graph.node("D1").unwrap();
        assert_eq!(dam.dam_id.as_deref(), Some("D1#dam"));
        assert_eq!(graph.sire_of("D1#dam"), Some("GG1"));
        assert_eq!(graph.node("D1#dam").unwrap().kind, NodeKind::Virtual);
    }

    #[test]
    fn test_merge_fills_missing_sire_on_existing_placeholder_only() {
        let mut graph = PedigreeGraph::new();
        // Two daughters of D1; the first row knows nothing about D1's sire,
        // the second supplies it.
        graph.merge_cow_rows(&[cow("C1", None, Some("D1"))]);
        assert_eq!(graph.sire_of("D1"), None);

        let mut second = cow("C2", None, Some("D1"));
        second.mgs_id = Some("G1".to_string());
        graph.merge_cow_rows(&[second]);
        assert_eq!(graph.sire_of("D1"), Some("G1"));

        // A third row with a different grandsire does not rewrite it.
        let mut third = cow("C3", None, Some("D1"));
        third.mgs_id = Some("G2".to_string());
        graph.merge_cow_rows(&[third]);
        assert_eq!(graph.sire_of("D1"), Some("G1"));
    }

    #[test]
    fn test_merge_normalizes_breeder_code_sire() {
        let mut sire = bull("JPH900", None, None, None);
        sire.naab_code = Some("007HO12345".to_string());
        let mut graph = PedigreeGraph::from_bull_rows(&[sire]);

        // Herd software typically records the service sire by NAAB code.
        graph.merge_cow_rows(&[cow("C1", Some("007HO12345"), None)]);
        assert_eq!(graph.sire_of("C1"), Some("JPH900"));
    }
}
