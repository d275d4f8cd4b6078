//! CSV export and bulk import.
//!
//! The column set is fixed on export. Import is header-driven: columns may
//! come in any order, unknown columns are ignored and missing ones read as
//! empty. `RollNumberID` is always recomputed, never taken from the file.

use crate::catalog::Catalog;
use crate::error::{RegistryError, Result};
use crate::record::{split_status, StudentInput, StudentRecord};
use crate::store::StoreState;
use crate::types::{AuditAction, Caller, Operation};
use crate::workflow::Registry;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{Read, Write};
use uuid::Uuid;

pub const COLUMNS: [&str; 17] = [
    "id",
    "RollNumberID",
    "FirstName",
    "FatherName",
    "GrandFatherName",
    "FourthName",
    "MotherName",
    "Gender",
    "DoB",
    "RegistryType",
    "RegistryNumber",
    "RegistryPage",
    "Specialist",
    "EnrollYear",
    "LeaveYear",
    "Note",
    "StudentStatus",
];

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

fn export_row(r: &StudentRecord) -> [String; 17] {
    [
        r.id.clone(),
        r.roll_number_id.clone(),
        r.first_name.clone(),
        r.father_name.clone(),
        r.grand_father_name.clone(),
        r.fourth_name.clone(),
        r.mother_name.clone(),
        r.gender.clone(),
        r.dob.clone(),
        r.registry_type.clone(),
        r.registry_number.to_string(),
        r.registry_page.to_string(),
        r.specialist.clone(),
        r.enroll_year.clone(),
        r.leave_year.clone(),
        r.note.clone(),
        r.status_joined(),
    ]
}

/// Write the header and one row per non-archived record, in store order.
/// Returns the number of data rows written.
pub fn write_csv<'a, W, I>(out: W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a StudentRecord>,
{
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(COLUMNS)?;
    let mut rows = 0;
    for record in records.into_iter().filter(|r| !r.archived) {
        wtr.write_record(export_row(record))?;
        rows += 1;
    }
    wtr.flush()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based data row; the header is not counted.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failures: Vec<RowFailure>,
}

/// Column positions resolved from the header row.
struct HeaderMap(HashMap<String, usize>);

impl HeaderMap {
    fn new(headers: &csv::StringRecord) -> Self {
        let map = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();
        Self(map)
    }

    fn field(&self, row: &csv::StringRecord, name: &str) -> String {
        self.0
            .get(name)
            .and_then(|&i| row.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn input(&self, row: &csv::StringRecord) -> StudentInput {
        let f = |name: &str| Some(self.field(row, name));
        StudentInput {
            id: f("id"),
            first_name: f("FirstName"),
            father_name: f("FatherName"),
            grand_father_name: f("GrandFatherName"),
            fourth_name: f("FourthName"),
            mother_name: f("MotherName"),
            gender: f("Gender"),
            dob: f("DoB"),
            registry_type: f("RegistryType"),
            registry_number: f("RegistryNumber"),
            registry_page: f("RegistryPage"),
            specialist: f("Specialist"),
            enroll_year: f("EnrollYear"),
            leave_year: f("LeaveYear"),
            note: f("Note"),
            student_status: Some(split_status(&self.field(row, "StudentStatus"))),
        }
    }
}

/// Parse every data row into a finished record. Rows that fail are reported
/// and left out; the caller decides how the good rows are committed.
pub fn parse_csv<R: Read>(input: R, catalog: &Catalog) -> (Vec<StudentRecord>, Vec<RowFailure>) {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = match rdr.headers() {
        Ok(h) => HeaderMap::new(h),
        Err(e) => {
            return (
                Vec::new(),
                vec![RowFailure {
                    row: 0,
                    reason: format!("unreadable header: {e}"),
                }],
            )
        }
    };

    let mut records = Vec::new();
    let mut failures = Vec::new();
    let mut first_row: HashMap<String, usize> = HashMap::new();
    for (idx, row) in rdr.records().enumerate() {
        let row_no = idx + 1;
        let parsed = row
            .map_err(RegistryError::from)
            .and_then(|row| {
                let input = headers.input(&row);
                let id = match input.id.as_deref() {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => Uuid::new_v4().to_string(),
                };
                StudentRecord::from_input(id, &input, catalog)
            })
            .and_then(|record| match first_row.get(&record.id).copied() {
                Some(first) => Err(RegistryError::Validation(format!(
                    "duplicate id '{}' in file (first seen on row {first})",
                    record.id
                ))),
                None => {
                    first_row.insert(record.id.clone(), row_no);
                    Ok(record)
                }
            });
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(row = row_no, error = %e, "skipping import row");
                failures.push(RowFailure {
                    row: row_no,
                    reason: e.to_string(),
                });
            }
        }
    }
    (records, failures)
}

/// Insert new ids, replace existing ones in place. A replaced record keeps
/// its archived flag.
fn upsert_all(state: &mut StoreState, records: Vec<StudentRecord>) {
    for mut record in records {
        if let Some(existing) = state.get(&record.id) {
            record.archived = existing.archived;
        }
        state.upsert_record(record);
    }
}

impl Registry {
    /// Export all active records as CSV. Admin only.
    pub fn export_csv<W: Write>(&self, caller: &Caller, out: W) -> Result<usize> {
        self.authorize(caller, Operation::Export)?;
        let state = self.store().snapshot();
        let rows = write_csv(out, &state.students)?;
        tracing::info!(user = %caller.user, rows, "exported");
        Ok(rows)
    }

    /// Import CSV rows directly into the store, bypassing the pending queue.
    /// Good rows commit together; bad rows are reported. Admin only.
    pub fn import_csv<R: Read>(&self, caller: &Caller, input: R) -> Result<ImportReport> {
        self.authorize(caller, Operation::Import)?;
        let catalog = self.catalog();
        let (records, failures) = parse_csv(input, &catalog);
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        if let Err(e) = self.store().transact(|s| {
            upsert_all(s, records);
            Ok(())
        }) {
            return self.refuse(caller, Operation::Import, None, e);
        }

        let report = ImportReport {
            imported: ids.len(),
            failures,
        };
        tracing::info!(
            user = %caller.user,
            imported = report.imported,
            failed = report.failures.len(),
            "import committed"
        );
        self.record_audit(
            caller,
            AuditAction::ImportCsv,
            json!({
                "imported": report.imported,
                "ids": ids,
                "failures": report.failures,
            }),
        );
        Ok(report)
    }
}
