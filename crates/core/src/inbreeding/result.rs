use std::fmt;

use indexmap::IndexMap;

use crate::types::AnimalId;

/// Terminal state of a coefficient computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientStatus {
    /// Computed from enumerated ancestor paths. Zero is a legitimate
    /// outcome here: no common ancestor contributed.
    Found,
    /// The node carried a reported coefficient, which is authoritative
    /// and replaces the path computation entirely.
    UsedReportedValue,
    /// Sire or dam link missing, so no path computation was possible.
    IncompleteParents,
    /// The queried id has no node in the graph.
    NotFound,
}

impl fmt::Display for CoefficientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CoefficientStatus::Found => "found",
            CoefficientStatus::UsedReportedValue => "reported-value",
            CoefficientStatus::IncompleteParents => "incomplete-parents",
            CoefficientStatus::NotFound => "not-found",
        };
        write!(f, "{}", label)
    }
}

/// One contributing route pair through a common ancestor.
#[derive(Debug, Clone, PartialEq)]
pub struct PathContribution {
    /// Both legs rendered for display, sire side first.
    pub rendered: String,
    /// This pair's term: 0.5^(n1 + n2 + 1) * (1 + F_ancestor).
    pub contribution: f64,
    /// Generational links from the sire-side candidate to the ancestor.
    pub n1: usize,
    /// Generational links from the dam-side candidate to the ancestor.
    pub n2: usize,
    /// The ancestor's own coefficient as used in the term.
    pub ancestor_coefficient: f64,
}

/// The result of an inbreeding or mating coefficient computation.
#[derive(Debug, Clone, PartialEq)]
pub struct InbreedingResult {
    pub status: CoefficientStatus,
    /// Wright coefficient as a fraction in [0, 1].
    pub coefficient: f64,
    /// Per-ancestor contribution totals, in discovery order.
    pub contributions: IndexMap<AnimalId, f64>,
    /// Per-ancestor path detail, keyed like `contributions`.
    pub paths: IndexMap<AnimalId, Vec<PathContribution>>,
}

impl InbreedingResult {
    pub(crate) fn with_status(status: CoefficientStatus, coefficient: f64) -> Self {
        Self {
            status,
            coefficient,
            contributions: IndexMap::new(),
            paths: IndexMap::new(),
        }
    }

    /// Total number of contributing path pairs across all ancestors.
    pub fn n_path_pairs(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }

    /// Print a formatted summary of the computation.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("=== Inbreeding Coefficient (Wright path method) ===\n\n");
        s.push_str(&format!(
            "Coefficient: {:.4}% ({:.6})\n",
            self.coefficient * 100.0,
            self.coefficient
        ));
        s.push_str(&format!("Status: {}\n\n", self.status));

        if self.contributions.is_empty() {
            s.push_str("No contributing common ancestors.\n");
            return s;
        }

        s.push_str("--- Common Ancestor Contributions ---\n");
        let mut sorted: Vec<(&AnimalId, &f64)> = self.contributions.iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        let show = sorted.len().min(10);
        for &(ancestor, value) in sorted.iter().take(show) {
            let n_paths = self.paths.get(ancestor).map(Vec::len).unwrap_or(0);
            s.push_str(&format!(
                "  {}: {:.4}%  ({} path pairs)\n",
                ancestor,
                value * 100.0,
                n_paths
            ));
        }
        if sorted.len() > 10 {
            s.push_str(&format!("  ... and {} more\n", sorted.len() - 10));
        }

        s
    }
}
