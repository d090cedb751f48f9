//! Bounded-concurrency survey fan-out.
//!
//! Every contact gets its own task, but a semaphore admits at most `workers`
//! surveys at once. The engine is blocking, so each admitted survey runs on
//! the blocking thread pool. Rows that repeat an address run one after
//! another, never concurrently. A failed survey is recorded in the report and
//! does not stop the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};

use crate::answers::TransportReplies;
use crate::contacts::Contact;
use crate::survey::{SurveyEngine, SurveyOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct BulkEntry {
    pub contact: Contact,
    #[serde(flatten)]
    pub result: BulkResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkResult {
    Completed(SurveyOutcome),
    Failed { error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub entries: Vec<BulkEntry>,
}

impl BulkReport {
    pub fn completed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.result, BulkResult::Completed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.completed()
    }

    pub fn qualified(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(&e.result, BulkResult::Completed(o) if o.qualified))
            .count()
    }
}

/// Survey every contact, at most `workers` at a time. Entries come back in
/// input order. `workers == 0` is treated as 1.
pub async fn run_bulk(
    engine: Arc<SurveyEngine>,
    contacts: Vec<Contact>,
    workers: usize,
    reply_timeout: Duration,
) -> BulkReport {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut inboxes: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
    let mut handles = Vec::with_capacity(contacts.len());

    for contact in contacts {
        let sem = semaphore.clone();
        let inbox = inboxes.entry(contact.address.clone()).or_default().clone();
        let engine = engine.clone();
        let task_contact = contact.clone();
        let handle = tokio::spawn(async move {
            // Rows sharing an address read one inbox; run them one after another.
            let _inbox = inbox.lock_owned().await;
            let _permit = match sem.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return Err("semaphore closed".to_string()),
            };
            let joined = tokio::task::spawn_blocking(move || {
                let answers = TransportReplies::new(engine.transport(), reply_timeout);
                engine
                    .run(&task_contact, &answers)
                    .map_err(|e| e.to_string())
            })
            .await;
            match joined {
                Ok(result) => result,
                Err(e) => Err(format!("survey task panicked: {e}")),
            }
        });
        handles.push((contact, handle));
    }

    let mut report = BulkReport::default();
    for (contact, handle) in handles {
        let outcome = match handle.await {
            Ok(r) => r,
            Err(e) => Err(format!("task join error: {e}")),
        };
        let result = match outcome {
            Ok(o) => BulkResult::Completed(o),
            Err(error) => {
                tracing::warn!(address = %contact.address, %error, "survey failed");
                BulkResult::Failed { error }
            }
        };
        report.entries.push(BulkEntry { contact, result });
    }

    tracing::info!(
        total = report.entries.len(),
        completed = report.completed(),
        failed = report.failed(),
        "bulk survey finished"
    );
    report
}
