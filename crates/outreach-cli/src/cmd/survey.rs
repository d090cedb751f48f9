use super::Services;
use crate::output::print_json;
use anyhow::Context;
use outreach_core::answers::{AnswerSource, InteractiveAnswers, TransportReplies};
use outreach_core::contacts::Contact;
use outreach_core::survey::SurveyOutcome;
use std::io::BufReader;
use std::path::Path;

pub fn run(
    root: &Path,
    address: &str,
    name: Option<&str>,
    interactive: bool,
    json: bool,
) -> anyhow::Result<()> {
    let services = Services::open(root, json)?;
    let contact = Contact::new(address, name.unwrap_or(address));

    let answers: Box<dyn AnswerSource> = if interactive {
        Box::new(InteractiveAnswers::new(
            BufReader::new(std::io::stdin()),
            std::io::stderr(),
        ))
    } else {
        Box::new(TransportReplies::new(
            services.transport.clone(),
            services.config.reply_timeout(),
        ))
    };

    let outcome = services
        .engine
        .run(&contact, answers.as_ref())
        .with_context(|| format!("survey for {address} failed"))?;

    if json {
        print_json(&serde_json::json!({
            "contact": contact,
            "outcome": outcome,
        }))?;
    } else {
        print_outcome(&contact, &outcome);
    }
    Ok(())
}

pub fn print_outcome(contact: &Contact, outcome: &SurveyOutcome) {
    println!("Survey for {} ({})", contact.display_name, contact.address);
    if outcome.answers.is_empty() {
        println!("  answers:   (none)");
    } else {
        println!("  answers:   {}", outcome.answers.join(" | "));
    }
    println!(
        "  qualified: {}",
        if outcome.qualified { "yes" } else { "no" }
    );
    if let Some(link) = &outcome.meeting_link {
        let note = if outcome.used_fallback { " (fallback)" } else { "" };
        println!("  meeting:   {link}{note}");
    }
}
