//! Where survey answers come from.
//!
//! An [`AnswerSource`] returns `Ok(Some(answer))`, `Ok(None)` when no answer
//! is available (the contact did not reply in time, or operator input ended),
//! or `Err` when the underlying channel failed.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::MessageTransport;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

pub trait AnswerSource {
    fn get_answer(&self, address: &str, question: &str)
        -> Result<Option<String>, TransportError>;
}

// ---------------------------------------------------------------------------
// InteractiveAnswers
// ---------------------------------------------------------------------------

/// An operator types each answer. Never times out; end of input means no answer.
pub struct InteractiveAnswers<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> InteractiveAnswers<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self {
            io: Mutex::new((input, prompt)),
        }
    }
}

impl<R: BufRead, W: Write> AnswerSource for InteractiveAnswers<R, W> {
    fn get_answer(
        &self,
        _address: &str,
        question: &str,
    ) -> Result<Option<String>, TransportError> {
        let mut io = self
            .io
            .lock()
            .map_err(|_| TransportError::Connection("operator input lock poisoned".into()))?;
        let (input, prompt) = &mut *io;

        if let Err(e) = write!(prompt, "{question} ").and_then(|_| prompt.flush()) {
            tracing::debug!(error = %e, "failed to write operator prompt");
        }

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .map_err(|e| TransportError::Connection(format!("operator input: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(|c: char| c == '\r' || c == '\n').len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }
}

// ---------------------------------------------------------------------------
// TransportReplies
// ---------------------------------------------------------------------------

/// The contact answers over the message transport.
///
/// The next inbound message from the address is taken as the answer to the
/// pending question; replies carry no correlation with the question asked.
pub struct TransportReplies {
    transport: Arc<dyn MessageTransport>,
    timeout: Duration,
}

impl TransportReplies {
    pub fn new(transport: Arc<dyn MessageTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }
}

impl AnswerSource for TransportReplies {
    fn get_answer(
        &self,
        address: &str,
        _question: &str,
    ) -> Result<Option<String>, TransportError> {
        let reply = self.transport.wait_for_reply(address, self.timeout)?;
        if reply.is_none() {
            tracing::info!(address, timeout_secs = self.timeout.as_secs(), "no reply before timeout");
        }
        Ok(reply)
    }
}
