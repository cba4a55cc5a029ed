// Wright path-method inbreeding: coefficient engine, planned-mating and
// relationship queries, and the flat audit export.

mod engine;
mod mating;
mod report;
mod result;

pub use engine::InbreedingEngine;
pub use report::write_audit_csv;
pub use result::{CoefficientStatus, InbreedingResult, PathContribution};
