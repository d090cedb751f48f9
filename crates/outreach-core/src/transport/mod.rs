//! Message transport capability and its implementations.
//!
//! The survey engine only needs two operations from a chat channel: send text
//! to an address, and wait for the next inbound reply from that address.
//!
//! - [`DryRunTransport`] prints outbound messages and never receives replies.
//! - [`GatewayTransport`] talks to an HTTP chat gateway.
//! - [`LoggedTransport`] wraps any transport and records every send in the store.

pub mod gateway;

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::SurveyStore;
use crate::error::TransportError;

pub use gateway::GatewayTransport;

// ---------------------------------------------------------------------------
// DeliveryStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    InvalidAddress,
    ConnectionError,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::InvalidAddress => "invalid_address",
            DeliveryStatus::ConnectionError => "connection_error",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "invalid_address" | "invalid_number" => Ok(DeliveryStatus::InvalidAddress),
            "connection_error" => Ok(DeliveryStatus::ConnectionError),
            other => Err(format!("unknown delivery status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageTransport
// ---------------------------------------------------------------------------

pub trait MessageTransport: Send + Sync {
    /// Deliver `text` to `address`.
    ///
    /// `Ok(InvalidAddress)` means the channel is up but the address cannot
    /// receive messages. `Err` means the channel itself is unreachable.
    fn send(&self, address: &str, text: &str) -> Result<DeliveryStatus, TransportError>;

    /// Block until the next inbound message from `address` arrives.
    ///
    /// Returns `Ok(None)` when `timeout` elapses without a reply.
    fn wait_for_reply(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError>;
}

// ---------------------------------------------------------------------------
// DryRunTransport
// ---------------------------------------------------------------------------

/// Writes each outbound message as `[to <address>] <text>` and has no
/// inbound channel.
pub struct DryRunTransport<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> DryRunTransport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MessageTransport for DryRunTransport<W> {
    fn send(&self, address: &str, text: &str) -> Result<DeliveryStatus, TransportError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| TransportError::Connection("output lock poisoned".into()))?;
        writeln!(out, "[to {address}] {text}")
            .and_then(|_| out.flush())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(DeliveryStatus::Sent)
    }

    fn wait_for_reply(
        &self,
        _address: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// LoggedTransport
// ---------------------------------------------------------------------------

/// Records one `messages` row per send, including sends that failed.
///
/// Store failures are logged and never change what the inner transport
/// reported.
pub struct LoggedTransport {
    inner: Arc<dyn MessageTransport>,
    store: Arc<dyn SurveyStore>,
}

impl LoggedTransport {
    pub fn new(inner: Arc<dyn MessageTransport>, store: Arc<dyn SurveyStore>) -> Self {
        Self { inner, store }
    }

    fn record(&self, address: &str, text: &str, status: DeliveryStatus) {
        if let Err(e) = self.store.log_message(address, text, status, Utc::now()) {
            tracing::warn!(address, %status, error = %e, "failed to log sent message");
        }
    }
}

impl MessageTransport for LoggedTransport {
    fn send(&self, address: &str, text: &str) -> Result<DeliveryStatus, TransportError> {
        match self.inner.send(address, text) {
            Ok(status) => {
                self.record(address, text, status);
                Ok(status)
            }
            Err(e) => {
                self.record(address, text, DeliveryStatus::ConnectionError);
                Err(e)
            }
        }
    }

    fn wait_for_reply(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        self.inner.wait_for_reply(address, timeout)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the engine and bulk tests.

    use super::*;
    use std::collections::{HashMap, VecDeque};

    #[derive(Default)]
    pub struct ScriptedTransport {
        pub sent: Mutex<Vec<(String, String)>>,
        replies: Mutex<HashMap<String, VecDeque<String>>>,
        pub fail_on_send: Mutex<Option<String>>,
        pub invalid: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn with_replies(address: &str, replies: &[&str]) -> Self {
            let t = Self::default();
            t.push_replies(address, replies);
            t
        }

        pub fn push_replies(&self, address: &str, replies: &[&str]) {
            self.replies
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .extend(replies.iter().map(|r| r.to_string()));
        }

        pub fn sent_to(&self, address: &str) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| a == address)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    impl MessageTransport for ScriptedTransport {
        fn send(&self, address: &str, text: &str) -> Result<DeliveryStatus, TransportError> {
            if let Some(needle) = self.fail_on_send.lock().unwrap().as_deref() {
                if text.contains(needle) {
                    return Err(TransportError::Connection("scripted failure".into()));
                }
            }
            if self.invalid.lock().unwrap().iter().any(|a| a == address) {
                return Ok(DeliveryStatus::InvalidAddress);
            }
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), text.to_string()));
            Ok(DeliveryStatus::Sent)
        }

        fn wait_for_reply(
            &self,
            address: &str,
            _timeout: Duration,
        ) -> Result<Option<String>, TransportError> {
            Ok(self
                .replies
                .lock()
                .unwrap()
                .get_mut(address)
                .and_then(|q| q.pop_front()))
        }
    }
}
