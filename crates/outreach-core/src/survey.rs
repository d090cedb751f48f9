//! The survey dialogue engine.
//!
//! One run per contact:
//!
//! ```text
//! welcome ─▶ question ─▶ answer ─▶ … ─▶ persist ─▶ qualify? ─┬─▶ schedule ─▶ invite
//!                           │                                └─▶ reject
//!                           └─ no answer: stop asking, go to persist
//! ```
//!
//! A transport failure, or an address the transport reports as invalid,
//! aborts the run before anything is persisted.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::answers::AnswerSource;
use crate::contacts::Contact;
use crate::db::SurveyStore;
use crate::error::{Result, SurveyError, TransportError};
use crate::qualify::ParsedAnswers;
use crate::scheduling::MeetingScheduler;
use crate::transport::{DeliveryStatus, MessageTransport};

pub const WELCOME: &str = "Hello! We are running a short survey to select participants \
for a study. Please answer a few questions.";

/// Asked in order; answers are stored positionally.
pub const QUESTIONS: &[&str] = &["How old are you?", "What is your education?"];

pub const REJECTION: &str =
    "Thank you for taking part! Unfortunately you do not meet the criteria.";

pub const DEFAULT_FALLBACK_LINK: &str = "https://zoom.us/j/123456789";

/// Separator used when persisting the answer list.
pub const ANSWER_SEPARATOR: &str = "|";

pub fn invitation(link: &str) -> String {
    format!("You qualify! We invite you to a meeting: {link}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyOutcome {
    pub answers: Vec<String>,
    pub qualified: bool,
    pub meeting_link: Option<String>,
    pub used_fallback: bool,
}

#[derive(Clone)]
pub struct SurveyEngine {
    transport: Arc<dyn MessageTransport>,
    store: Arc<dyn SurveyStore>,
    scheduler: Arc<dyn MeetingScheduler>,
    fallback_link: String,
}

impl SurveyEngine {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        store: Arc<dyn SurveyStore>,
        scheduler: Arc<dyn MeetingScheduler>,
    ) -> Self {
        Self {
            transport,
            store,
            scheduler,
            fallback_link: DEFAULT_FALLBACK_LINK.to_string(),
        }
    }

    pub fn with_fallback_link(mut self, link: impl Into<String>) -> Self {
        self.fallback_link = link.into();
        self
    }

    pub fn transport(&self) -> Arc<dyn MessageTransport> {
        Arc::clone(&self.transport)
    }

    fn deliver(&self, address: &str, text: &str) -> Result<()> {
        match self.transport.send(address, text)? {
            DeliveryStatus::Sent => Ok(()),
            DeliveryStatus::InvalidAddress => Err(SurveyError::Undeliverable(address.to_string())),
            DeliveryStatus::ConnectionError => Err(SurveyError::Transport(
                TransportError::Connection(format!("delivery to {address} failed")),
            )),
        }
    }

    /// Run the full dialogue with `contact`, reading answers from `answers`.
    pub fn run(&self, contact: &Contact, answers: &dyn AnswerSource) -> Result<SurveyOutcome> {
        let address = contact.address.as_str();
        tracing::info!(address, "survey started");

        self.deliver(address, WELCOME)?;

        let mut collected = Vec::with_capacity(QUESTIONS.len());
        for question in QUESTIONS {
            self.deliver(address, question)?;
            match answers.get_answer(address, question)? {
                Some(answer) => collected.push(answer),
                None => {
                    tracing::info!(address, answered = collected.len(), "no answer, stopping");
                    break;
                }
            }
        }

        self.store.save_response(
            address,
            &contact.display_name,
            &collected.join(ANSWER_SEPARATOR),
            Utc::now(),
        )?;

        let parsed = ParsedAnswers::from_answers(&collected);
        if !parsed.qualifies() {
            self.deliver(address, REJECTION)?;
            tracing::info!(address, age = parsed.age, "survey finished: not qualified");
            return Ok(SurveyOutcome {
                answers: collected,
                qualified: false,
                meeting_link: None,
                used_fallback: false,
            });
        }

        let (link, used_fallback) = match self.scheduler.schedule_meeting(contact) {
            Ok(link) => (link, false),
            Err(e) => {
                tracing::warn!(address, error = %e, "scheduling failed, sending fallback link");
                (self.fallback_link.clone(), true)
            }
        };
        self.deliver(address, &invitation(&link))?;
        tracing::info!(address, used_fallback, "survey finished: qualified");

        Ok(SurveyOutcome {
            answers: collected,
            qualified: true,
            meeting_link: Some(link),
            used_fallback,
        })
    }
}
