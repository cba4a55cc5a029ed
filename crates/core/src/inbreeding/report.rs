use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::inbreeding::result::InbreedingResult;

/// One line of the flat audit export.
///
/// `ancestor` rows carry the per-ancestor total; `path` rows, written when
/// path detail is requested, carry one contributing route pair each with
/// its leg lengths and the ancestor coefficient that entered the term.
#[derive(Debug, Serialize)]
struct AuditRow<'a> {
    row_type: &'a str,
    subject: &'a str,
    ancestor: &'a str,
    contribution: f64,
    n1: Option<usize>,
    n2: Option<usize>,
    ancestor_f: Option<f64>,
    path: Option<&'a str>,
}

/// Write a computation's contribution breakdown as a flat CSV file.
///
/// `subject` labels every row (an animal id or a `SIRExDAM` mating label).
/// Ancestors appear in the result's discovery order; with `include_paths`
/// each ancestor's row is followed by its path rows.
///
/// # Errors
/// Returns an error if the file cannot be created or a row cannot be
/// written.
pub fn write_audit_csv<P: AsRef<Path>>(
    subject: &str,
    result: &InbreedingResult,
    path: P,
    include_paths: bool,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    for (ancestor, contribution) in &result.contributions {
        writer.serialize(AuditRow {
            row_type: "ancestor",
            subject,
            ancestor,
            contribution: *contribution,
            n1: None,
            n2: None,
            ancestor_f: None,
            path: None,
        })?;

        if !include_paths {
            continue;
        }
        if let Some(details) = result.paths.get(ancestor) {
            for detail in details {
                writer.serialize(AuditRow {
                    row_type: "path",
                    subject,
                    ancestor,
                    contribution: detail.contribution,
                    n1: Some(detail.n1),
                    n2: Some(detail.n2),
                    ancestor_f: Some(detail.ancestor_coefficient),
                    path: Some(&detail.rendered),
                })?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}
