pub mod bulk;
pub mod db;
pub mod send;
pub mod survey;

use anyhow::Context;
use outreach_core::config::Config;
use outreach_core::contacts::{parse_contacts, ContactRow};
use outreach_core::db::SurveyDb;
use outreach_core::scheduling::{MeetingScheduler, NoScheduler, ZoomClient};
use outreach_core::survey::SurveyEngine;
use outreach_core::transport::{DryRunTransport, GatewayTransport, LoggedTransport, MessageTransport};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Everything a command needs, wired from the project config.
pub struct Services {
    pub config: Config,
    pub db: Arc<SurveyDb>,
    /// Outbound transport; every send is logged to `db`.
    pub transport: Arc<dyn MessageTransport>,
    pub engine: Arc<SurveyEngine>,
}

impl Services {
    /// Wire services for `root`. With `json` set, dry-run output goes to
    /// stderr so stdout stays machine-readable.
    pub fn open(root: &Path, json: bool) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let db_path = config.resolve_database_path(root);
        let db = Arc::new(
            SurveyDb::open(&db_path)
                .with_context(|| format!("failed to open database {}", db_path.display()))?,
        );

        let inner: Arc<dyn MessageTransport> = match &config.gateway_url {
            Some(url) => Arc::new(
                GatewayTransport::new(url.as_str(), config.gateway_token.clone())
                    .context("failed to build gateway client")?,
            ),
            None => {
                tracing::debug!("no gateway_url configured, using dry-run transport");
                let out: Box<dyn Write + Send> = if json {
                    Box::new(std::io::stderr())
                } else {
                    Box::new(std::io::stdout())
                };
                Arc::new(DryRunTransport::new(out))
            }
        };
        let transport: Arc<dyn MessageTransport> =
            Arc::new(LoggedTransport::new(inner, db.clone()));

        let scheduler: Arc<dyn MeetingScheduler> = match config.zoom_credentials() {
            Some(creds) => Arc::new(
                ZoomClient::new(creds, config.zoom_settings())
                    .context("failed to build scheduling client")?,
            ),
            None => Arc::new(NoScheduler),
        };

        let engine = SurveyEngine::new(transport.clone(), db.clone(), scheduler)
            .with_fallback_link(config.fallback_link.clone());

        Ok(Self {
            config,
            db,
            transport,
            engine: Arc::new(engine),
        })
    }
}

pub fn read_contacts(path: &Path) -> anyhow::Result<Vec<ContactRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_contacts(&text))
}
