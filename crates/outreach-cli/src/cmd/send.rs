use super::{read_contacts, Services};
use crate::output::print_json;
use anyhow::Context;
use outreach_core::transport::DeliveryStatus;
use std::path::Path;

#[derive(serde::Serialize)]
struct SendResult {
    address: String,
    status: DeliveryStatus,
    error: Option<String>,
}

/// Import contacts from `csv` and send each its message.
///
/// A failed send is reported and the remaining rows are still processed.
pub fn run(root: &Path, csv: &Path, json: bool) -> anyhow::Result<()> {
    let services = Services::open(root, json)?;
    let rows = read_contacts(csv)?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let address = row.contact.address.clone();
        services
            .db
            .upsert_contact(&address, &row.contact.display_name)
            .with_context(|| format!("failed to save contact {address}"))?;

        let text = row
            .message
            .as_deref()
            .unwrap_or(&services.config.default_message);
        if !json {
            println!("Sending to {address}...");
        }
        match services.transport.send(&address, text) {
            Ok(status) => {
                if !json && status != DeliveryStatus::Sent {
                    println!("  {address}: {status}");
                }
                results.push(SendResult {
                    address,
                    status,
                    error: None,
                });
            }
            Err(e) => {
                if !json {
                    println!("Error sending to {address}: {e}");
                }
                results.push(SendResult {
                    address,
                    status: DeliveryStatus::ConnectionError,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if json {
        print_json(&results)?;
    } else {
        let sent = results
            .iter()
            .filter(|r| r.status == DeliveryStatus::Sent)
            .count();
        println!("Sent {sent} of {} message(s)", results.len());
    }
    Ok(())
}
