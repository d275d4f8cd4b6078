//! Student record model, write input, and the normalization applied on
//! every write path.

use crate::canon::{canonical_full_name, canonicalize};
use crate::catalog::Catalog;
use crate::error::{RegistryError, Result};
use crate::roll_number;
use serde::{Deserialize, Deserializer, Serialize};

/// Fields that must be present and non-blank on every committed record.
pub const REQUIRED_FIELDS: &[&str] = &[
    "FirstName",
    "FatherName",
    "Gender",
    "DoB",
    "RegistryType",
    "RegistryNumber",
    "RegistryPage",
    "Specialist",
];

/// Delimiter used when status tags are flattened to a single string.
pub const STATUS_DELIMITER: char = '|';

// ---------------------------------------------------------------------------
// StudentRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StudentRecord {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "RollNumberID")]
    pub roll_number_id: String,
    pub first_name: String,
    pub father_name: String,
    #[serde(default)]
    pub grand_father_name: String,
    #[serde(default)]
    pub fourth_name: String,
    #[serde(default)]
    pub mother_name: String,
    pub gender: String,
    #[serde(rename = "DoB")]
    pub dob: String,
    pub registry_type: String,
    pub registry_number: u32,
    pub registry_page: u32,
    pub specialist: String,
    #[serde(default)]
    pub enroll_year: String,
    #[serde(default)]
    pub leave_year: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub student_status: Vec<String>,
    #[serde(rename = "archived", default)]
    pub archived: bool,
}

impl StudentRecord {
    /// An empty record with only its id set. Not valid until filled in.
    pub fn blank(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roll_number_id: String::new(),
            first_name: String::new(),
            father_name: String::new(),
            grand_father_name: String::new(),
            fourth_name: String::new(),
            mother_name: String::new(),
            gender: String::new(),
            dob: String::new(),
            registry_type: String::new(),
            registry_number: 0,
            registry_page: 0,
            specialist: String::new(),
            enroll_year: String::new(),
            leave_year: String::new(),
            note: String::new(),
            student_status: Vec::new(),
            archived: false,
        }
    }

    /// Build a new record from create input: required-field check, merge,
    /// normalization, roll-number derivation.
    pub fn from_input(id: impl Into<String>, input: &StudentInput, catalog: &Catalog) -> Result<Self> {
        input.require_all()?;
        let mut record = Self::blank(id);
        record.apply(input)?;
        record.finalize(catalog)?;
        Ok(record)
    }

    /// Merge the fields present in `patch`; absent fields are preserved.
    /// Identity text is canonicalized and the DoB defaulted as it is set.
    pub fn apply(&mut self, patch: &StudentInput) -> Result<()> {
        fn set_name(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *slot = canonicalize(v);
            }
        }
        fn set_text(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *slot = v.trim().to_string();
            }
        }

        set_name(&mut self.first_name, &patch.first_name);
        set_name(&mut self.father_name, &patch.father_name);
        set_name(&mut self.grand_father_name, &patch.grand_father_name);
        set_name(&mut self.fourth_name, &patch.fourth_name);
        set_name(&mut self.mother_name, &patch.mother_name);
        set_text(&mut self.gender, &patch.gender);
        if let Some(dob) = &patch.dob {
            self.dob = roll_number::default_date(dob);
        }
        set_text(&mut self.registry_type, &patch.registry_type);
        if let Some(n) = &patch.registry_number {
            self.registry_number = parse_count("RegistryNumber", n)?;
        }
        if let Some(p) = &patch.registry_page {
            self.registry_page = parse_count("RegistryPage", p)?;
        }
        set_text(&mut self.specialist, &patch.specialist);
        set_text(&mut self.enroll_year, &patch.enroll_year);
        set_text(&mut self.leave_year, &patch.leave_year);
        set_text(&mut self.note, &patch.note);
        if let Some(tags) = &patch.student_status {
            self.student_status = clean_tags(tags)?;
        }
        Ok(())
    }

    /// Re-check required text fields and recompute the roll number.
    pub fn finalize(&mut self, catalog: &Catalog) -> Result<()> {
        self.validate()?;
        self.roll_number_id = roll_number::generate(self, catalog)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let text_fields = [
            ("FirstName", &self.first_name),
            ("FatherName", &self.father_name),
            ("Gender", &self.gender),
            ("DoB", &self.dob),
            ("RegistryType", &self.registry_type),
            ("Specialist", &self.specialist),
        ];
        for (name, value) in text_fields {
            if value.trim().is_empty() {
                return Err(RegistryError::Validation(format!("missing {name}")));
            }
        }
        Ok(())
    }

    /// Canonical `First Father GrandFather Fourth` used by search.
    pub fn canonical_name(&self) -> String {
        canonical_full_name([
            self.first_name.as_str(),
            self.father_name.as_str(),
            self.grand_father_name.as_str(),
            self.fourth_name.as_str(),
        ])
    }

    pub fn status_joined(&self) -> String {
        self.student_status.join(&STATUS_DELIMITER.to_string())
    }
}

fn parse_count(field: &str, raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RegistryError::Validation(format!("missing {field}")));
    }
    raw.parse::<u32>().map_err(|_| {
        RegistryError::Validation(format!(
            "{field} must be a non-negative integer, got '{raw}'"
        ))
    })
}

fn clean_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut cleaned = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tag.contains(STATUS_DELIMITER) {
            return Err(RegistryError::Validation(format!(
                "status tag '{tag}' must not contain '{STATUS_DELIMITER}'"
            )));
        }
        cleaned.push(tag.to_string());
    }
    Ok(cleaned)
}

/// Split a `|`-joined status string into tags; blank segments are dropped.
pub fn split_status(joined: &str) -> Vec<String> {
    joined
        .split(STATUS_DELIMITER)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// StudentInput
// ---------------------------------------------------------------------------

/// Create payload or update patch as delivered by a caller. Every field is
/// optional; `None` means "not specified". `RollNumberID` and `archived` are
/// not accepted from callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StudentInput {
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grand_father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fourth_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(
        rename = "DoB",
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub registry_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub registry_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub enroll_year: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub leave_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(
        default,
        deserialize_with = "tags_or_joined",
        skip_serializing_if = "Option::is_none"
    )]
    pub student_status: Option<Vec<String>>,
}

impl StudentInput {
    /// Fail with the first required field that is absent or blank.
    pub fn require_all(&self) -> Result<()> {
        let values = [
            &self.first_name,
            &self.father_name,
            &self.gender,
            &self.dob,
            &self.registry_type,
            &self.registry_number,
            &self.registry_page,
            &self.specialist,
        ];
        for (name, value) in REQUIRED_FIELDS.iter().zip(values) {
            if value.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                return Err(RegistryError::Validation(format!("missing {name}")));
            }
        }
        Ok(())
    }

    /// The same patch with identity text canonicalized, the DoB defaulted and
    /// numbers checked. This is the form stored on pending updates.
    pub fn normalized(&self) -> Result<Self> {
        let name = |v: &Option<String>| v.as_deref().map(canonicalize);
        let text = |v: &Option<String>| v.as_deref().map(|s| s.trim().to_string());
        let count = |field: &str, v: &Option<String>| -> Result<Option<String>> {
            v.as_deref()
                .map(|raw| parse_count(field, raw).map(|n| n.to_string()))
                .transpose()
        };
        Ok(Self {
            id: text(&self.id),
            first_name: name(&self.first_name),
            father_name: name(&self.father_name),
            grand_father_name: name(&self.grand_father_name),
            fourth_name: name(&self.fourth_name),
            mother_name: name(&self.mother_name),
            gender: text(&self.gender),
            dob: self.dob.as_deref().map(roll_number::default_date),
            registry_type: text(&self.registry_type),
            registry_number: count("RegistryNumber", &self.registry_number)?,
            registry_page: count("RegistryPage", &self.registry_page)?,
            specialist: text(&self.specialist),
            enroll_year: text(&self.enroll_year),
            leave_year: text(&self.leave_year),
            note: text(&self.note),
            student_status: self.student_status.as_deref().map(clean_tags).transpose()?,
        })
    }
}

impl From<&StudentRecord> for StudentInput {
    fn from(r: &StudentRecord) -> Self {
        Self {
            id: Some(r.id.clone()),
            first_name: Some(r.first_name.clone()),
            father_name: Some(r.father_name.clone()),
            grand_father_name: Some(r.grand_father_name.clone()),
            fourth_name: Some(r.fourth_name.clone()),
            mother_name: Some(r.mother_name.clone()),
            gender: Some(r.gender.clone()),
            dob: Some(r.dob.clone()),
            registry_type: Some(r.registry_type.clone()),
            registry_number: Some(r.registry_number.to_string()),
            registry_page: Some(r.registry_page.to_string()),
            specialist: Some(r.specialist.clone()),
            enroll_year: Some(r.enroll_year.clone()),
            leave_year: Some(r.leave_year.clone()),
            note: Some(r.note.clone()),
            student_status: Some(r.student_status.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Browser and spreadsheet clients send numbers for years and registry
/// numbers; keep them as text until normalization.
fn text_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<TextOrNumber>::deserialize(d)?.map(|v| match v {
        TextOrNumber::Text(s) => s,
        TextOrNumber::Int(n) => n.to_string(),
        TextOrNumber::Float(f) => f.to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsOrJoined {
    Tags(Vec<String>),
    Joined(String),
}

fn tags_or_joined<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<TagsOrJoined>::deserialize(d)?.map(|v| match v {
        TagsOrJoined::Tags(tags) => tags,
        TagsOrJoined::Joined(s) => split_status(&s),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
