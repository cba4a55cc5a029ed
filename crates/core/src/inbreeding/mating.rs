use std::collections::HashSet;
use std::sync::Arc;

use crate::inbreeding::engine::InbreedingEngine;
use crate::inbreeding::result::{CoefficientStatus, InbreedingResult};

impl InbreedingEngine {
    /// Expected inbreeding coefficient of a hypothetical offspring of two
    /// candidates, with no offspring node in the graph.
    ///
    /// Returns `NotFound` only when neither candidate has a node; one
    /// known side is enough to compute (the other side simply contributes
    /// no ancestors). The pair cache is symmetric, so swapping the
    /// candidates returns the same shared result.
    pub fn mating_coefficient(&self, sire_id: &str, dam_id: &str) -> Arc<InbreedingResult> {
        if !self.graph().contains(sire_id) && !self.graph().contains(dam_id) {
            return Arc::new(InbreedingResult::with_status(
                CoefficientStatus::NotFound,
                0.0,
            ));
        }
        let mut visiting = HashSet::new();
        self.pair_guarded(sire_id, dam_id, &mut visiting)
    }

    /// Additive genetic relationship between two animals, defined as twice
    /// the coefficient their hypothetical offspring would have.
    ///
    /// An animal's relationship to itself is 1.0, whether or not the extra
    /// relationship from its own inbreeding is known.
    pub fn relationship_coefficient(&self, first: &str, second: &str) -> f64 {
        if self.graph().canonical_id(first) == self.graph().canonical_id(second) {
            return 1.0;
        }
        2.0 * self.mating_coefficient(first, second).coefficient
    }
}
