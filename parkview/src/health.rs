//! Health tracking of the active map style.
//!
//! Every style selection starts a new *generation*. Diagnostic fetches carry a
//! [`DiagnosticTicket`] of the generation they were started for, and results of older generations
//! are dropped. The map switches to the baseline style only when both a rendering error and a
//! failed diagnostic fetch were seen for the same generation, in whichever order they arrive. A
//! lone rendering error could be a one-frame glitch and only marks the style as unhealthy.

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::style::StyleRef;

/// Health of the active style.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleHealth {
    /// Nothing is known yet.
    #[default]
    Unknown,
    /// Style definition was fetched successfully.
    Healthy,
    /// Style failed to fetch or to render.
    Unhealthy,
}

impl Display for StyleHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StyleHealth::Unknown => "unknown",
            StyleHealth::Healthy => "healthy",
            StyleHealth::Unhealthy => "unhealthy",
        })
    }
}

/// Ties a diagnostic fetch to the style selection it was started for.
#[derive(Debug, Clone)]
pub struct DiagnosticTicket {
    style: StyleRef,
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl DiagnosticTicket {
    fn new(style: StyleRef, generation: u64) -> Self {
        Self {
            style,
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Style the fetch was started for.
    pub fn style(&self) -> &StyleRef {
        &self.style
    }

    /// Generation of the style selection.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the style was replaced after the ticket was issued.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Result of a diagnostic fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The API returned a success status.
    Succeeded {
        /// HTTP status code.
        status: u16,
    },
    /// The request failed or the API returned an error status.
    Failed {
        /// HTTP status code if a response was received.
        status: Option<u16>,
        /// Human readable description.
        reason: String,
    },
}

impl FetchOutcome {
    /// Whether the style definition was retrieved.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Succeeded { .. })
    }
}

/// Instruction to replace a broken style with the baseline one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// The broken style.
    pub from: StyleRef,
    /// The style to switch to.
    pub to: StyleRef,
}

/// What [`StyleHealthTracker::record_fetch`] did with a diagnostic result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRecord {
    /// The result belongs to a replaced style and was dropped.
    Dropped,
    /// The result was applied to the active style.
    Applied,
    /// The result confirmed an earlier rendering error and the style has to be replaced.
    FallBack(Fallback),
}

impl FetchRecord {
    /// Whether the result was applied to the active style.
    pub fn is_applied(&self) -> bool {
        !matches!(self, FetchRecord::Dropped)
    }
}

/// State machine tracking the health of the active style.
#[derive(Debug)]
pub struct StyleHealthTracker {
    baseline: StyleRef,
    ticket: DiagnosticTicket,
    health: StyleHealth,
    fetch_failed: bool,
    render_failed: bool,
    fallback_emitted: bool,
}

impl StyleHealthTracker {
    /// Creates a tracker for the initially active style.
    pub fn new(active: StyleRef, baseline: StyleRef) -> Self {
        Self {
            baseline,
            ticket: DiagnosticTicket::new(active, 0),
            health: StyleHealth::Unknown,
            fetch_failed: false,
            render_failed: false,
            fallback_emitted: false,
        }
    }

    /// Style the health is tracked for.
    pub fn active_style(&self) -> &StyleRef {
        &self.ticket.style
    }

    /// Style used for fallbacks.
    pub fn baseline(&self) -> &StyleRef {
        &self.baseline
    }

    /// Current health of the active style.
    pub fn health(&self) -> StyleHealth {
        self.health
    }

    /// Ticket for a diagnostic fetch of the active style.
    pub fn ticket(&self) -> DiagnosticTicket {
        self.ticket.clone()
    }

    /// Makes `style` active. Health goes back to `Unknown` and the fetch in flight for the previous
    /// style is cancelled, even when the same style is selected again.
    pub fn select(&mut self, style: StyleRef) -> DiagnosticTicket {
        self.ticket.cancel();
        let generation = self.ticket.generation + 1;

        log::debug!("Style {style} selected (generation {generation})");

        self.ticket = DiagnosticTicket::new(style, generation);
        self.health = StyleHealth::Unknown;
        self.fetch_failed = false;
        self.render_failed = false;
        self.fallback_emitted = false;

        self.ticket()
    }

    /// Applies the result of a diagnostic fetch.
    ///
    /// A failure that arrives after a rendering error of the same generation completes the
    /// corroboration and yields the fallback instruction.
    pub fn record_fetch(
        &mut self,
        ticket: &DiagnosticTicket,
        outcome: &FetchOutcome,
    ) -> FetchRecord {
        if ticket.is_cancelled() || ticket.generation != self.ticket.generation {
            log::debug!(
                "Dropping diagnostic result for replaced style {} (generation {})",
                ticket.style,
                ticket.generation
            );
            return FetchRecord::Dropped;
        }

        match outcome {
            FetchOutcome::Succeeded { .. } if self.fetch_failed => {
                log::debug!(
                    "Ignoring successful fetch of {}: already confirmed unhealthy",
                    ticket.style
                );
            }
            FetchOutcome::Succeeded { status } => {
                log::info!("Style {} is healthy (HTTP {status})", ticket.style);
                self.health = StyleHealth::Healthy;
            }
            FetchOutcome::Failed { status, reason } => {
                log::warn!(
                    "Style {} is unhealthy (status {status:?}): {reason}",
                    ticket.style
                );
                self.health = StyleHealth::Unhealthy;
                self.fetch_failed = true;

                if self.render_failed {
                    if let Some(fallback) = self.fall_back() {
                        return FetchRecord::FallBack(fallback);
                    }
                }
            }
        }

        FetchRecord::Applied
    }

    /// Applies a rendering error reported by the map engine for the active style.
    ///
    /// Returns a fallback instruction at most once per style selection, and only when a failed
    /// diagnostic fetch has already confirmed the style as unhealthy.
    pub fn record_render_error(&mut self) -> Option<Fallback> {
        self.render_failed = true;

        if self.health == StyleHealth::Unhealthy && self.fetch_failed {
            return self.fall_back();
        }

        if self.health != StyleHealth::Unhealthy {
            log::debug!(
                "Rendering error for {}, waiting for diagnostic confirmation",
                self.ticket.style
            );
        }
        self.health = StyleHealth::Unhealthy;

        None
    }

    fn fall_back(&mut self) -> Option<Fallback> {
        let active = &self.ticket.style;
        if self.fallback_emitted || *active == self.baseline {
            return None;
        }

        log::warn!("Falling back from {active} to {}", self.baseline);
        self.fallback_emitted = true;
        Some(Fallback {
            from: active.clone(),
            to: self.baseline.clone(),
        })
    }
}
