//! # LogWriter: renders runtime events through `tracing`
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO erie::subscribers::log: resource started resource="root/light" kind=Some(Input)
//! WARN erie::subscribers::log: production failed resource="root/light" reason="sensor offline"
//! INFO erie::subscribers::log: shutdown requested reason="elapsed"
//! ```

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let resource = e.resource.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ResourceStarted => {
                info!(seq = e.seq, resource, kind = ?e.resource_kind, "resource started");
            }
            EventKind::ResourceStopped => {
                info!(seq = e.seq, resource, kind = ?e.resource_kind, "resource stopped");
            }
            EventKind::ProductionFailed => {
                warn!(seq = e.seq, resource, reason, "production failed");
            }
            EventKind::RunStarted => info!(seq = e.seq, root = resource, "run started"),
            EventKind::ShutdownRequested => info!(seq = e.seq, reason, "shutdown requested"),
            EventKind::TeardownFailed => error!(seq = e.seq, root = resource, reason, "teardown failed"),
            EventKind::RunFinished => info!(seq = e.seq, "run finished"),
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, subscriber = resource, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, subscriber = resource, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
