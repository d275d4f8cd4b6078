use crate::cmd::{open_registry, read_input};
use crate::output::{print_fields, print_json, print_table};
use anyhow::Context;
use clap::{Args, Subcommand};
use registry_core::record::{StudentInput, StudentRecord};
use registry_core::types::Caller;
use registry_core::Outcome;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum StudentSubcommand {
    /// Create a student (writers queue the create for approval)
    Create {
        #[command(flatten)]
        fields: StudentArgs,
    },

    /// Update the given fields of a student; others are left as they are
    Update {
        id: String,
        #[command(flatten)]
        fields: StudentArgs,
    },

    /// List active students
    List,

    /// Show one student, archived or not
    Show { id: String },

    /// Archive a student (admin)
    Archive { id: String },
}

/// Student fields as flags. `--from` loads a JSON payload first and the
/// flags override it.
#[derive(Args, Default)]
pub struct StudentArgs {
    /// JSON file (or '-') holding a student payload
    #[arg(long, value_name = "FILE")]
    from: Option<PathBuf>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    father_name: Option<String>,
    #[arg(long)]
    grand_father_name: Option<String>,
    #[arg(long)]
    fourth_name: Option<String>,
    #[arg(long)]
    mother_name: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    /// Date of birth: YYYY, YYYY-MM or YYYY-MM-DD
    #[arg(long)]
    dob: Option<String>,
    /// Registry type label, e.g. صباحي
    #[arg(long)]
    registry_type: Option<String>,
    #[arg(long)]
    registry_number: Option<String>,
    #[arg(long)]
    registry_page: Option<String>,
    /// Specialist track name (short, full or machine name)
    #[arg(long)]
    specialist: Option<String>,
    #[arg(long)]
    enroll_year: Option<String>,
    #[arg(long)]
    leave_year: Option<String>,
    #[arg(long)]
    note: Option<String>,
    /// Status tag; repeat for several
    #[arg(long = "status", value_name = "TAG")]
    status: Vec<String>,
}

impl StudentArgs {
    fn into_input(self) -> anyhow::Result<StudentInput> {
        let mut input = match &self.from {
            Some(path) => {
                let text = read_input(path)?;
                serde_json::from_str::<StudentInput>(&text)
                    .with_context(|| format!("invalid student payload in {}", path.display()))?
            }
            None => StudentInput::default(),
        };

        fn set(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut input.first_name, self.first_name);
        set(&mut input.father_name, self.father_name);
        set(&mut input.grand_father_name, self.grand_father_name);
        set(&mut input.fourth_name, self.fourth_name);
        set(&mut input.mother_name, self.mother_name);
        set(&mut input.gender, self.gender);
        set(&mut input.dob, self.dob);
        set(&mut input.registry_type, self.registry_type);
        set(&mut input.registry_number, self.registry_number);
        set(&mut input.registry_page, self.registry_page);
        set(&mut input.specialist, self.specialist);
        set(&mut input.enroll_year, self.enroll_year);
        set(&mut input.leave_year, self.leave_year);
        set(&mut input.note, self.note);
        if !self.status.is_empty() {
            input.student_status = Some(self.status);
        }
        Ok(input)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, caller: &Caller, subcmd: StudentSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        StudentSubcommand::Create { fields } => create(root, caller, fields, json),
        StudentSubcommand::Update { id, fields } => update(root, caller, &id, fields, json),
        StudentSubcommand::List => list(root, json),
        StudentSubcommand::Show { id } => show(root, &id, json),
        StudentSubcommand::Archive { id } => archive(root, caller, &id, json),
    }
}

fn create(root: &Path, caller: &Caller, fields: StudentArgs, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let input = fields.into_input()?;
    let outcome = registry
        .create(caller, &input)
        .context("failed to create student")?;
    report_outcome(&outcome, json)
}

fn update(
    root: &Path,
    caller: &Caller,
    id: &str,
    fields: StudentArgs,
    json: bool,
) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let patch = fields.into_input()?;
    let outcome = registry
        .update(caller, id, &patch)
        .with_context(|| format!("failed to update student '{id}'"))?;
    report_outcome(&outcome, json)
}

fn report_outcome(outcome: &Outcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        Outcome::Committed { record } => {
            println!("Committed {} ({})", record.id, record.roll_number_id);
        }
        Outcome::Pending { pending } => {
            println!(
                "Queued {} {} for approval ({})",
                pending.change.kind(),
                pending.id,
                pending.change.roll_number()
            );
        }
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let records = registry.list_active();

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No students.");
        return Ok(());
    }
    print_records(&records);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let r = registry
        .get(id)
        .with_context(|| format!("failed to load student '{id}'"))?;

    if json {
        return print_json(&r);
    }
    print_fields(&[
        ("id", r.id.clone()),
        ("RollNumberID", r.roll_number_id.clone()),
        ("Name", full_name(&r)),
        ("MotherName", r.mother_name.clone()),
        ("Gender", r.gender.clone()),
        ("DoB", r.dob.clone()),
        ("RegistryType", r.registry_type.clone()),
        ("RegistryNumber", r.registry_number.to_string()),
        ("RegistryPage", r.registry_page.to_string()),
        ("Specialist", r.specialist.clone()),
        ("EnrollYear", r.enroll_year.clone()),
        ("LeaveYear", r.leave_year.clone()),
        ("Note", r.note.clone()),
        ("StudentStatus", r.status_joined()),
        ("Archived", r.archived.to_string()),
    ]);
    Ok(())
}

fn archive(root: &Path, caller: &Caller, id: &str, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    let record = registry
        .archive(caller, id)
        .with_context(|| format!("failed to archive student '{id}'"))?;

    if json {
        print_json(&record)?;
    } else {
        println!("Archived {} ({})", record.id, record.roll_number_id);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared rendering
// ---------------------------------------------------------------------------

fn full_name(r: &StudentRecord) -> String {
    [
        r.first_name.as_str(),
        r.father_name.as_str(),
        r.grand_father_name.as_str(),
        r.fourth_name.as_str(),
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

pub(crate) fn print_records(records: &[StudentRecord]) {
    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.roll_number_id.clone(),
                full_name(r),
                r.specialist.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "ROLL NUMBER", "NAME", "SPECIALIST"], rows);
}
