use crate::cmd::open_registry;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use registry_core::types::Caller;
use std::path::Path;

#[derive(Subcommand)]
pub enum PendingSubcommand {
    /// List writes awaiting approval (supervisor)
    List,

    /// Commit a pending write (supervisor)
    Approve {
        /// Pending id, e.g. P3
        id: String,
    },

    /// Drop a pending write without committing it (supervisor)
    Reject {
        /// Pending id, e.g. P3
        id: String,
        /// Reason recorded in the audit trail
        #[arg(long)]
        reason: Option<String>,
    },
}

pub fn run(root: &Path, caller: &Caller, subcmd: PendingSubcommand, json: bool) -> anyhow::Result<()> {
    let registry = open_registry(root)?;
    match subcmd {
        PendingSubcommand::List => {
            let items = registry
                .pending_list(caller)
                .context("failed to list pending writes")?;
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("Nothing pending.");
                return Ok(());
            }
            let rows = items
                .iter()
                .map(|p| {
                    vec![
                        p.id.clone(),
                        p.change.kind().to_string(),
                        p.change.record_id().to_string(),
                        p.change.roll_number().to_string(),
                        format!("{} ({})", p.requested_by, p.requested_role),
                        p.requested_at.format("%Y-%m-%d %H:%M").to_string(),
                    ]
                })
                .collect();
            print_table(
                &["ID", "KIND", "RECORD", "ROLL NUMBER", "REQUESTED BY", "AT"],
                rows,
            );
        }
        PendingSubcommand::Approve { id } => {
            let record = registry
                .approve_pending(caller, &id)
                .with_context(|| format!("failed to approve '{id}'"))?;
            if json {
                return print_json(&record);
            }
            println!("Approved {id}: {} ({})", record.id, record.roll_number_id);
        }
        PendingSubcommand::Reject { id, reason } => {
            let item = registry
                .reject_pending(caller, &id, reason.as_deref())
                .with_context(|| format!("failed to reject '{id}'"))?;
            if json {
                return print_json(&item);
            }
            println!("Rejected {} {}", item.change.kind(), item.id);
        }
    }
    Ok(())
}
