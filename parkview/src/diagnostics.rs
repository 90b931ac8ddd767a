//! Diagnostic fetches of style definitions.
//!
//! Fetches run on a tokio runtime and never touch the viewer state directly. Their reports are
//! queued and picked up by [`ViewerShell::pump`](crate::ViewerShell::pump) on the UI thread.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use url::Url;

use crate::error::ParkviewError;
use crate::health::{DiagnosticTicket, FetchOutcome};
use crate::messenger::Messenger;
use crate::style::{redact, StyleSummary};

/// Maximum number of characters of a non-JSON response body written to the log.
const RAW_BODY_LOG_LIMIT: usize = 500;

/// Response of the style hosting API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase of the status.
    pub reason: Option<String>,
    /// Response body.
    pub body: String,
}

impl StyleResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Loads style definitions.
#[async_trait::async_trait]
pub trait StyleFetcher: Send + Sync {
    /// Performs a GET request to the given url.
    async fn fetch(&self, url: &Url) -> Result<StyleResponse, ParkviewError>;
}

/// [`StyleFetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpStyleFetcher {
    client: reqwest::Client,
}

impl HttpStyleFetcher {
    /// Creates a new fetcher with its own HTTP client.
    pub fn new() -> Result<Self, ParkviewError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parkview/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl StyleFetcher for HttpStyleFetcher {
    async fn fetch(&self, url: &Url) -> Result<StyleResponse, ParkviewError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(StyleResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

/// Completed diagnostic fetch.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    /// Ticket the fetch was started with.
    pub ticket: DiagnosticTicket,
    /// What happened.
    pub outcome: FetchOutcome,
    /// Summary of the style definition if the body was a JSON object.
    pub summary: Option<StyleSummary>,
}

/// Fetches the style definition and turns the response into a report.
///
/// Returns `None` if the ticket was cancelled while the request was in flight.
pub async fn diagnose(
    fetcher: &dyn StyleFetcher,
    url: &Url,
    ticket: &DiagnosticTicket,
) -> Option<DiagnosticReport> {
    let result = fetcher.fetch(url).await;
    if ticket.is_cancelled() {
        log::debug!("Style {} was replaced, dropping its diagnostic result", ticket.style());
        return None;
    }

    let redacted = redact(url.as_str());
    let (outcome, summary) = match result {
        Ok(response) => {
            log::info!(
                "Styles API {} {} {redacted}",
                response.status,
                response.reason.as_deref().unwrap_or_default()
            );

            let summary = match StyleSummary::from_json(&response.body) {
                Ok(summary) => {
                    summary.log(ticket.style().as_str());
                    Some(summary)
                }
                Err(_) => {
                    let head: String = response.body.chars().take(RAW_BODY_LOG_LIMIT).collect();
                    log::debug!("Styles API raw response: {head}");
                    None
                }
            };

            let outcome = if response.is_success() {
                FetchOutcome::Succeeded {
                    status: response.status,
                }
            } else {
                let reason = summary
                    .as_ref()
                    .and_then(|summary| summary.message.clone())
                    .or(response.reason)
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                FetchOutcome::Failed {
                    status: Some(response.status),
                    reason,
                }
            };

            (outcome, summary)
        }
        Err(err) => {
            log::error!("Styles API fetch error for {redacted}: {err}");
            (
                FetchOutcome::Failed {
                    status: None,
                    reason: err.to_string(),
                },
                None,
            )
        }
    };

    Some(DiagnosticReport {
        ticket: ticket.clone(),
        outcome,
        summary,
    })
}

/// Runs diagnostic fetches in the background and collects their reports.
pub struct DiagnosticRunner {
    fetcher: Arc<dyn StyleFetcher>,
    runtime: Handle,
    sender: UnboundedSender<DiagnosticReport>,
    receiver: UnboundedReceiver<DiagnosticReport>,
    messenger: Option<Arc<dyn Messenger>>,
}

impl DiagnosticRunner {
    /// Creates a runner spawning fetches on the given runtime.
    pub fn new(fetcher: Arc<dyn StyleFetcher>, runtime: Handle) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            fetcher,
            runtime,
            sender,
            receiver,
            messenger: None,
        }
    }

    /// Sets the messenger notified every time a report is ready.
    pub fn with_messenger(mut self, messenger: impl Messenger + 'static) -> Self {
        self.messenger = Some(Arc::new(messenger));
        self
    }

    /// Starts a fetch. The fetch is not awaited: its report shows up in [`Self::try_next`].
    pub fn spawn(&self, url: Url, ticket: DiagnosticTicket) -> JoinHandle<()> {
        let fetcher = self.fetcher.clone();
        let sender = self.sender.clone();
        let messenger = self.messenger.clone();

        self.runtime.spawn(async move {
            let Some(report) = diagnose(fetcher.as_ref(), &url, &ticket).await else {
                return;
            };

            if sender.send(report).is_ok() {
                if let Some(messenger) = messenger {
                    messenger.request_redraw();
                }
            }
        })
    }

    /// Next completed report, if any.
    pub fn try_next(&mut self) -> Option<DiagnosticReport> {
        self.receiver.try_recv().ok()
    }
}
