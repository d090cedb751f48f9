use crate::output::{print_json, print_table};
use anyhow::Context;
use outreach_core::config::Config;
use outreach_core::db::SurveyDb;
use std::path::Path;

fn open_db(root: &Path) -> anyhow::Result<SurveyDb> {
    let config = Config::load(root).context("failed to load config")?;
    let path = config.resolve_database_path(root);
    SurveyDb::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Create or migrate the schema, optionally inserting sample rows.
pub fn update(root: &Path, seed: bool) -> anyhow::Result<()> {
    let db = open_db(root)?;
    if seed && db.seed_samples().context("failed to seed sample data")? {
        println!("Inserted sample contacts");
    }
    println!("Database updated");
    Ok(())
}

pub fn stats(root: &Path, json: bool) -> anyhow::Result<()> {
    let stats = open_db(root)?.stats().context("failed to read stats")?;
    if json {
        return print_json(&stats);
    }

    println!("Messages sent: {}", stats.messages_sent);
    println!("Replies received: {}", stats.replies);
    println!("Contacts: {}", stats.contacts);
    for (status, count) in &stats.by_status {
        println!("  {status:<18} {count}");
    }
    Ok(())
}

pub fn responses(root: &Path, json: bool) -> anyhow::Result<()> {
    let responses = open_db(root)?
        .responses()
        .context("failed to list responses")?;
    if json {
        return print_json(&responses);
    }
    if responses.is_empty() {
        println!("No survey responses yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = responses
        .iter()
        .map(|r| {
            vec![
                r.address.clone(),
                r.display_name.clone(),
                r.survey_date.clone(),
                r.answer_list().join(" | "),
            ]
        })
        .collect();
    print_table(&["ADDRESS", "NAME", "DATE", "ANSWERS"], &rows);
    Ok(())
}
