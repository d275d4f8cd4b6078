//! Registry identifier (`RollNumberID`) derivation.
//!
//! Format, bit-exact and consumed by the public mirror:
//!
//! ```text
//! <2-char specialist code><2-digit birth year><1-char registry type><3-digit number><5-digit page>
//! ```
//!
//! e.g. `EL05R01200003`. The identifier is a pure function of the record's
//! contributing fields and the catalog; it is recomputed on every write.

use crate::catalog::Catalog;
use crate::error::{RegistryError, Result};
use crate::record::StudentRecord;
use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

static YEAR_ONLY_RE: OnceLock<Regex> = OnceLock::new();
static YEAR_MONTH_RE: OnceLock<Regex> = OnceLock::new();

fn year_only_re() -> &'static Regex {
    YEAR_ONLY_RE.get_or_init(|| Regex::new(r"^\d{4}$").unwrap())
}

fn year_month_re() -> &'static Regex {
    YEAR_MONTH_RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}$").unwrap())
}

/// Fill in a partial date: a bare year becomes July 1st, a year-month
/// becomes the first of that month. Anything else is returned trimmed.
pub fn default_date(input: &str) -> String {
    let input = input.trim();
    if year_only_re().is_match(input) {
        format!("{input}-07-01")
    } else if year_month_re().is_match(input) {
        format!("{input}-01")
    } else {
        input.to_string()
    }
}

/// Parse a (defaulted) date of birth. Accepts `YYYY-MM-DD` and RFC 3339.
pub fn parse_birth_date(dob: &str) -> Result<NaiveDate> {
    let dob = default_date(dob);
    if let Ok(date) = NaiveDate::parse_from_str(&dob, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&dob)
        .map(|dt| dt.date_naive())
        .map_err(|_| RegistryError::InvalidDate(dob))
}

/// Two low-order digits of the birth year.
pub fn birth_year_suffix(dob: &str) -> Result<String> {
    let year = parse_birth_date(dob)?.year();
    Ok(format!("{:02}", year.rem_euclid(100)))
}

/// Zero-pad to `width`; wider values are kept whole.
fn pad(value: u32, width: usize) -> String {
    format!("{value:0width$}")
}

/// The five contributing fields, already resolved to their codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollNumberParts<'a> {
    pub specialist_code: &'a str,
    pub birth_year: String,
    pub registry_type_code: &'a str,
    pub registry_number: u32,
    pub registry_page: u32,
}

impl RollNumberParts<'_> {
    pub fn compose(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.specialist_code,
            self.birth_year,
            self.registry_type_code,
            pad(self.registry_number, 3),
            pad(self.registry_page, 5)
        )
    }
}

/// Resolve a record's contributing fields against the catalog.
pub fn parts<'a>(record: &'a StudentRecord, catalog: &'a Catalog) -> Result<RollNumberParts<'a>> {
    Ok(RollNumberParts {
        specialist_code: catalog.specialist_code(&record.specialist),
        birth_year: birth_year_suffix(&record.dob)?,
        registry_type_code: catalog.registry_type_code(&record.registry_type),
        registry_number: record.registry_number,
        registry_page: record.registry_page,
    })
}

/// Derive the `RollNumberID` for a record. Fails only on an unparseable DoB.
pub fn generate(record: &StudentRecord, catalog: &Catalog) -> Result<String> {
    Ok(parts(record, catalog)?.compose())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
