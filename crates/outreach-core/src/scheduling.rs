//! Meeting scheduling for qualifying contacts.
//!
//! [`ZoomClient`] creates an instant meeting and returns its join URL. It
//! authenticates with either a static bearer token or server-to-server OAuth;
//! OAuth access tokens live in a [`TokenCache`] owned by the client.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::contacts::Contact;
use crate::error::SchedulingError;

/// A cached token is refreshed once it is this close to expiring.
const EXPIRY_MARGIN_SECS: i64 = 60;

pub trait MeetingScheduler: Send + Sync {
    /// Create a meeting for `contact` and return the join URL.
    fn schedule_meeting(&self, contact: &Contact) -> Result<String, SchedulingError>;
}

/// Scheduler used when no credentials are configured. Always fails, so the
/// survey engine sends the fallback link.
pub struct NoScheduler;

impl MeetingScheduler for NoScheduler {
    fn schedule_meeting(&self, _contact: &Contact) -> Result<String, SchedulingError> {
        Err(SchedulingError::NotConfigured)
    }
}

// ---------------------------------------------------------------------------
// Credentials and token cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoomCredentials {
    /// Pre-issued bearer token, used as-is.
    Static(String),
    /// Server-to-server OAuth (`account_credentials` grant).
    ServerToServer {
        account_id: String,
        client_id: String,
        client_secret: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCache {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct MeetingResponse {
    #[serde(default)]
    join_url: Option<String>,
}

// ---------------------------------------------------------------------------
// ZoomClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ZoomSettings {
    pub api_url: String,
    pub oauth_url: String,
    pub timeout: Duration,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.zoom.us/v2".to_string(),
            oauth_url: "https://zoom.us".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct ZoomClient {
    client: Client,
    settings: ZoomSettings,
    credentials: ZoomCredentials,
    cache: Mutex<Option<TokenCache>>,
}

impl ZoomClient {
    pub fn new(
        credentials: ZoomCredentials,
        settings: ZoomSettings,
    ) -> Result<Self, SchedulingError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            credentials,
            cache: Mutex::new(None),
        })
    }

    /// Return a bearer token valid for at least another minute, exchanging
    /// OAuth credentials for a fresh one when the cached token is stale.
    ///
    /// The cache lock is not held during the exchange; concurrent callers
    /// that both see a stale token each fetch one and the last write wins.
    pub fn get_valid_token(&self) -> Result<String, SchedulingError> {
        let (account_id, client_id, client_secret) = match &self.credentials {
            ZoomCredentials::Static(token) => return Ok(token.clone()),
            ZoomCredentials::ServerToServer {
                account_id,
                client_id,
                client_secret,
            } => (account_id, client_id, client_secret),
        };

        let now = Utc::now();
        if let Some(cached) = self.cached_token().filter(|c| c.is_valid_at(now)) {
            return Ok(cached.token);
        }

        tracing::debug!("refreshing scheduling API token");
        let url = format!("{}/oauth/token", self.settings.oauth_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", account_id.as_str()),
            ])
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SchedulingError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        let body: TokenResponse = resp.json()?;

        let fresh = TokenCache {
            token: body.access_token,
            expires_at: now + chrono::Duration::seconds(body.expires_in),
        };
        let token = fresh.token.clone();
        self.set_cached_token(Some(fresh));
        Ok(token)
    }

    /// Replace the cached OAuth token.
    pub fn set_cached_token(&self, token: Option<TokenCache>) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = token;
        }
    }

    pub fn cached_token(&self) -> Option<TokenCache> {
        self.cache.lock().ok().and_then(|c| c.clone())
    }
}

impl MeetingScheduler for ZoomClient {
    fn schedule_meeting(&self, contact: &Contact) -> Result<String, SchedulingError> {
        let token = self.get_valid_token()?;
        let url = format!(
            "{}/users/me/meetings",
            self.settings.api_url.trim_end_matches('/')
        );
        let payload = serde_json::json!({
            "topic": format!("Interview with {}", contact.display_name),
            "type": 1,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            let body = resp.text().unwrap_or_default();
            return Err(SchedulingError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let meeting: MeetingResponse = resp.json()?;
        match meeting.join_url {
            Some(link) if !link.is_empty() => Ok(link),
            _ => Err(SchedulingError::MissingJoinUrl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn settings(server: &mockito::Server) -> ZoomSettings {
        ZoomSettings {
            api_url: server.url(),
            oauth_url: server.url(),
            timeout: Duration::from_secs(5),
        }
    }

    fn s2s() -> ZoomCredentials {
        ZoomCredentials::ServerToServer {
            account_id: "acct".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
        }
    }

    fn alice() -> Contact {
        Contact::new("+100", "Alice")
    }

    #[test]
    fn static_token_creates_meeting() {
        let mut server = mockito::Server::new();
        let m = server
            .mock("POST", "/users/me/meetings")
            .match_header("authorization", "Bearer jwt-token")
            .match_body(Matcher::Json(
                serde_json::json!({"topic": "Interview with Alice", "type": 1}),
            ))
            .with_status(201)
            .with_body(r#"{"join_url":"https://zoom.us/j/42"}"#)
            .expect(1)
            .create();

        let client = ZoomClient::new(ZoomCredentials::Static("jwt-token".into()), settings(&server))
            .unwrap();
        assert_eq!(client.schedule_meeting(&alice()).unwrap(), "https://zoom.us/j/42");
        m.assert();
    }

    #[test]
    fn oauth_token_is_fetched_once_and_reused() {
        let mut server = mockito::Server::new();
        let token = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "account_credentials".into()),
                Matcher::UrlEncoded("account_id".into(), "acct".into()),
            ]))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-1","expires_in":3600}"#)
            .expect(1)
            .create();
        let meeting = server
            .mock("POST", "/users/me/meetings")
            .match_header("authorization", "Bearer tok-1")
            .with_status(201)
            .with_body(r#"{"join_url":"https://zoom.us/j/1"}"#)
            .expect(2)
            .create();

        let client = ZoomClient::new(s2s(), settings(&server)).unwrap();
        client.schedule_meeting(&alice()).unwrap();
        client.schedule_meeting(&alice()).unwrap();

        token.assert();
        meeting.assert();
        assert_eq!(client.cached_token().unwrap().token, "tok-1");
    }

    #[test]
    fn token_near_expiry_is_refreshed() {
        let mut server = mockito::Server::new();
        let token = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"access_token":"tok-new","expires_in":3600}"#)
            .expect(1)
            .create();

        let client = ZoomClient::new(s2s(), settings(&server)).unwrap();
        client.set_cached_token(Some(TokenCache {
            token: "tok-old".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(30),
        }));

        assert_eq!(client.get_valid_token().unwrap(), "tok-new");
        token.assert();
    }

    #[test]
    fn cache_is_readable_while_exchange_is_in_flight() {
        use std::io::Write;

        let mut server = mockito::Server::new();
        let _token = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(300));
                w.write_all(br#"{"access_token":"tok-slow","expires_in":3600}"#)
            })
            .create();

        let client = std::sync::Arc::new(ZoomClient::new(s2s(), settings(&server)).unwrap());
        let fetcher = {
            let client = client.clone();
            std::thread::spawn(move || client.get_valid_token().unwrap())
        };
        std::thread::sleep(Duration::from_millis(100));

        let started = std::time::Instant::now();
        assert!(client.cached_token().is_none());
        assert!(started.elapsed() < Duration::from_millis(150));

        assert_eq!(fetcher.join().unwrap(), "tok-slow");
        assert_eq!(client.cached_token().unwrap().token, "tok-slow");
    }

    #[test]
    fn valid_cached_token_skips_exchange() {
        let mut server = mockito::Server::new();
        let token = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .expect(0)
            .create();

        let client = ZoomClient::new(s2s(), settings(&server)).unwrap();
        client.set_cached_token(Some(TokenCache {
            token: "tok-cached".into(),
            expires_at: Utc::now() + chrono::Duration::minutes(30),
        }));

        assert_eq!(client.get_valid_token().unwrap(), "tok-cached");
        token.assert();
    }

    #[test]
    fn failed_token_exchange_is_auth_error() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid_client")
            .create();

        let client = ZoomClient::new(s2s(), settings(&server)).unwrap();
        match client.schedule_meeting(&alice()) {
            Err(SchedulingError::Auth(msg)) => assert!(msg.contains("401"), "msg: {msg}"),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[test]
    fn api_error_status_is_reported() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/users/me/meetings")
            .with_status(401)
            .with_body(r#"{"message":"Invalid access token."}"#)
            .create();

        let client =
            ZoomClient::new(ZoomCredentials::Static("bad".into()), settings(&server)).unwrap();
        match client.schedule_meeting(&alice()) {
            Err(SchedulingError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid access token"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn missing_join_url_is_an_error() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/users/me/meetings")
            .with_status(201)
            .with_body(r#"{"id":123}"#)
            .create();

        let client =
            ZoomClient::new(ZoomCredentials::Static("jwt".into()), settings(&server)).unwrap();
        assert!(matches!(
            client.schedule_meeting(&alice()),
            Err(SchedulingError::MissingJoinUrl)
        ));
    }

    #[test]
    fn no_scheduler_is_not_configured() {
        assert!(matches!(
            NoScheduler.schedule_meeting(&alice()),
            Err(SchedulingError::NotConfigured)
        ));
    }
}
