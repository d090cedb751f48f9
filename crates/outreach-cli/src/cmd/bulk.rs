use super::{read_contacts, Services};
use crate::output::{print_json, print_table};
use outreach_core::bulk::{run_bulk, BulkResult};
use outreach_core::contacts::Contact;
use std::path::Path;

/// Survey every contact in `csv`, `workers` at a time (config value if unset).
pub fn run(root: &Path, csv: &Path, workers: Option<usize>, json: bool) -> anyhow::Result<()> {
    let services = Services::open(root, json)?;
    let contacts: Vec<Contact> = read_contacts(csv)?
        .into_iter()
        .map(|row| row.contact)
        .collect();
    let workers = workers.unwrap_or(services.config.workers);
    tracing::info!(contacts = contacts.len(), workers, "starting bulk survey");

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(run_bulk(
        services.engine.clone(),
        contacts,
        workers,
        services.config.reply_timeout(),
    ));

    if json {
        print_json(&report)?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = report
        .entries
        .iter()
        .map(|e| match &e.result {
            BulkResult::Completed(o) => vec![
                e.contact.address.clone(),
                e.contact.display_name.clone(),
                "completed".to_string(),
                if o.qualified { "yes" } else { "no" }.to_string(),
                o.answers.join(" | "),
            ],
            BulkResult::Failed { error } => vec![
                e.contact.address.clone(),
                e.contact.display_name.clone(),
                "failed".to_string(),
                "-".to_string(),
                error.clone(),
            ],
        })
        .collect();
    print_table(&["ADDRESS", "NAME", "STATUS", "QUALIFIED", "ANSWERS"], &rows);
    println!();
    println!(
        "completed: {}  failed: {}  qualified: {}",
        report.completed(),
        report.failed(),
        report.qualified()
    );
    Ok(())
}
