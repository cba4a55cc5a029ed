use std::path::Path;

use crate::error::{PedigreeError, Result};

/// One bull record from the registry extract.
///
/// `reg_id` is the canonical registration id. All other fields are optional:
/// unknown parents are coded as `"0"`, `""`, or `"NA"` in the source files.
/// The maternal side of a bull record is indirect (maternal grandsire and
/// maternal great-grandsire); the dam herself is not registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BullRow {
    pub reg_id: String,
    pub naab_code: Option<String>,
    pub sire_id: Option<String>,
    pub mgs_id: Option<String>,
    pub mmgs_id: Option<String>,
    /// Genomically derived inbreeding, as a percentage in [0, 100].
    pub genomic_inbreeding_pct: Option<f64>,
}

/// One cow record from the herd extract.
///
/// Unlike bulls, cows carry a direct dam link; the grandsire columns let the
/// dam's own lineage be synthesized when she has no record of her own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CowRow {
    pub cow_id: String,
    pub sire_id: Option<String>,
    pub dam_id: Option<String>,
    pub mgs_id: Option<String>,
    pub mmgs_id: Option<String>,
    /// Reported inbreeding, as a percentage in [0, 100].
    pub reported_inbreeding_pct: Option<f64>,
}

/// Read a bull registry extract from a CSV file.
///
/// Required columns (header, case-insensitive): `reg`, `sire`, `mgs`,
/// `mmgs`. Optional columns: `naab` (breeder code), `gib` (genomic
/// inbreeding percentage). Rows with an empty registration id are skipped
/// with a warning; unparseable percentages are logged and treated as
/// absent.
///
/// # Errors
/// Returns an error if the file cannot be read, a required column is
/// missing, or a row is malformed.
pub fn read_bull_registry<P: AsRef<Path>>(path: P) -> Result<Vec<BullRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let reg_col = require_column(&headers, "reg")?;
    let sire_col = require_column(&headers, "sire")?;
    let mgs_col = require_column(&headers, "mgs")?;
    let mmgs_col = require_column(&headers, "mmgs")?;
    let naab_col = headers.iter().position(|h| h == "naab");
    let gib_col = headers.iter().position(|h| h == "gib");

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;

        let reg_id = field(&record, reg_col, "reg")?;
        if reg_id.is_empty() {
            log::warn!("skipping bull row with an empty registration id");
            continue;
        }
        let reg_id = reg_id.to_string();

        let naab_code = naab_col
            .and_then(|col| record.get(col))
            .and_then(parse_id);
        let genomic_inbreeding_pct = gib_col
            .and_then(|col| record.get(col))
            .and_then(|raw| parse_pct(&reg_id, raw));

        rows.push(BullRow {
            sire_id: parse_id(field(&record, sire_col, "sire")?),
            mgs_id: parse_id(field(&record, mgs_col, "mgs")?),
            mmgs_id: parse_id(field(&record, mmgs_col, "mmgs")?),
            reg_id,
            naab_code,
            genomic_inbreeding_pct,
        });
    }

    Ok(rows)
}

/// Read a cow herd extract from a CSV file.
///
/// Required columns (header, case-insensitive): `cow`, `sire`, `dam`,
/// `mgs`, `mmgs`. Optional column: `gib` (reported inbreeding percentage).
///
/// # Errors
/// Returns an error if the file cannot be read, a required column is
/// missing, or a row is malformed.
pub fn read_cow_registry<P: AsRef<Path>>(path: P) -> Result<Vec<CowRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let cow_col = require_column(&headers, "cow")?;
    let sire_col = require_column(&headers, "sire")?;
    let dam_col = require_column(&headers, "dam")?;
    let mgs_col = require_column(&headers, "mgs")?;
    let mmgs_col = require_column(&headers, "mmgs")?;
    let gib_col = headers.iter().position(|h| h == "gib");

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;

        let cow_id = field(&record, cow_col, "cow")?;
        if cow_id.is_empty() {
            log::warn!("skipping cow row with an empty id");
            continue;
        }
        let cow_id = cow_id.to_string();

        let reported_inbreeding_pct = gib_col
            .and_then(|col| record.get(col))
            .and_then(|raw| parse_pct(&cow_id, raw));

        rows.push(CowRow {
            sire_id: parse_id(field(&record, sire_col, "sire")?),
            dam_id: parse_id(field(&record, dam_col, "dam")?),
            mgs_id: parse_id(field(&record, mgs_col, "mgs")?),
            mmgs_id: parse_id(field(&record, mmgs_col, "mmgs")?),
            cow_id,
            reported_inbreeding_pct,
        });
    }

    Ok(rows)
}

fn require_column(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PedigreeError::ColumnNotFound(name.to_string()))
}

fn field<'a>(record: &'a csv::StringRecord, col: usize, name: &str) -> Result<&'a str> {
    record.get(col).ok_or_else(|| {
        PedigreeError::Registry(format!("missing '{}' field in row", name))
    })
}

/// Parse an identifier cell, returning `None` for unknown coding.
///
/// Unknown identifiers are coded as `"0"`, `""`, or `"NA"` (any case).
fn parse_id(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "0" || trimmed.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a percentage cell. Unknown coding maps to `None`; anything else
/// that fails to parse is logged and treated as absent.
fn parse_pct(id: &str, s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!(
                "unparseable inbreeding percentage '{}' for '{}'; treating as absent",
                trimmed,
                id
            );
            None
        }
    }
}
