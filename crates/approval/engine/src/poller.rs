//! Notification poller
//!
//! A fixed-interval refresh of notification counts and per-document chain
//! summaries for one session. This is a coarse cache, not a subscription:
//! readers see whatever the last completed poll fetched.

use crate::backend::{DocumentBackend, SessionRefresher};
use crate::chain_evaluator::current_position;
use crate::error::BackendResult;
use crate::retry::with_session_retry;
use approval_types::{
    ApproverCode, Document, DocumentNumber, DocumentStatus, IdentityId, Notification,
    SessionContext,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

/// Where a document's chain stood at the last poll
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub number: DocumentNumber,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_approver: Option<ApproverCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_delegate: Option<IdentityId>,
}

impl ChainSummary {
    pub fn of(number: DocumentNumber, doc: &Document) -> Self {
        let entry = current_position(&doc.approval_chain)
            .index()
            .map(|i| &doc.approval_chain[i]);
        Self {
            number,
            status: doc.status,
            current_line: entry.map(|e| e.line_number),
            current_approver: entry.map(|e| e.approver.clone()),
            current_delegate: entry.and_then(|e| e.delegate.clone()),
        }
    }
}

/// Result of the most recent poll
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polled_at: Option<DateTime<Utc>>,
    pub notifications: Vec<Notification>,
    pub summaries: BTreeMap<DocumentNumber, ChainSummary>,
}

impl PollSnapshot {
    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

pub struct NotificationPoller {
    backend: Arc<dyn DocumentBackend>,
    refresher: Arc<dyn SessionRefresher>,
    session: SessionContext,
    interval: Duration,
    snapshot: Arc<RwLock<PollSnapshot>>,
    running: Arc<RwLock<bool>>,
}

impl NotificationPoller {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        refresher: Arc<dyn SessionRefresher>,
        session: SessionContext,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            backend,
            refresher,
            session,
            interval,
            snapshot: Arc::new(RwLock::new(PollSnapshot::default())),
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// The last completed poll.
    pub async fn snapshot(&self) -> PollSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Fetch notifications and refresh chain summaries once.
    pub async fn poll_once(&self) -> BackendResult<PollSnapshot> {
        let backend = &self.backend;
        let session = &self.session;
        let notifications = with_session_retry(
            self.refresher.as_ref(),
            session,
            "list_notifications",
            move || backend.list_notifications(session),
        )
        .await?;

        let mut summaries = BTreeMap::new();
        for notification in &notifications {
            let number = &notification.document;
            if summaries.contains_key(number) {
                continue;
            }
            let fetched = with_session_retry(self.refresher.as_ref(), session, "fetch", move || {
                backend.fetch(session, number)
            })
            .await;
            match fetched {
                Ok(doc) => {
                    summaries.insert(number.clone(), ChainSummary::of(number.clone(), &doc));
                }
                // A single missing document does not spoil the poll
                Err(err) => {
                    tracing::warn!(document = %number, error = %err, "Chain summary unavailable");
                }
            }
        }

        let snapshot = PollSnapshot {
            polled_at: Some(Utc::now()),
            notifications,
            summaries,
        };
        *self.snapshot.write().await = snapshot.clone();

        tracing::debug!(
            identity = %self.session.acting(),
            count = snapshot.count(),
            documents = snapshot.summaries.len(),
            "Notifications polled"
        );
        Ok(snapshot)
    }

    /// Poll on a fixed interval until [`Self::stop`] is called.
    pub async fn run(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            identity = %self.session.acting(),
            interval_secs = self.interval.as_secs(),
            "Notification poller started"
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;

            let running = self.running.read().await;
            if !*running {
                break;
            }
            drop(running);

            if let Err(e) = self.poll_once().await {
                tracing::error!(error = %e, "Notification poll failed");
            }
        }

        tracing::info!("Notification poller stopped");
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::engine::WorkflowEngine;
    use approval_types::*;

    async fn seeded() -> (Arc<InMemoryBackend>, DocumentNumber) {
        let directory = OrgDirectory::new()
            .with_code("DEPA", Some("depa.head"))
            .with_code("ITSV", Some("itsv.head"))
            .with_person("pub.one", None, 1);
        let backend = Arc::new(InMemoryBackend::new(
            WorkflowEngine::default(),
            Arc::new(directory),
        ));
        let draft = Document::draft(
            DocumentKind::Ticket,
            "Monitor arm",
            IdentityId::new("pub.one"),
            ApproverCode::new("ITSV"),
        )
        .with_approver("DEPA")
        .with_line_item("Dual arm", 1);
        let number = backend
            .create(&SessionContext::new("pub.one"), draft)
            .await
            .unwrap();
        (backend, number)
    }

    #[tokio::test]
    async fn test_poll_once_caches_counts_and_summaries() {
        let (backend, number) = seeded().await;
        let poller = NotificationPoller::new(
            backend.clone(),
            backend.clone(),
            SessionContext::new("depa.head"),
            Duration::from_secs(60),
        );
        assert_eq!(poller.snapshot().await.count(), 0);

        let snapshot = poller.poll_once().await.unwrap();
        assert_eq!(snapshot.count(), 1);
        let summary = &snapshot.summaries[&number];
        assert_eq!(summary.status, DocumentStatus::Unpublished);
        assert_eq!(summary.current_line, Some(0));
        assert_eq!(summary.current_approver, Some(ApproverCode::new("DEPA")));
        assert_eq!(poller.snapshot().await, snapshot);
    }

    #[tokio::test]
    async fn test_poll_refreshes_expired_session() {
        let (backend, _) = seeded().await;
        let session = SessionContext::new("depa.head");
        backend.expire_session(&session.principal).await;
        let poller = NotificationPoller::new(
            backend.clone(),
            backend.clone(),
            session,
            Duration::from_secs(60),
        );
        assert_eq!(poller.poll_once().await.unwrap().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_stopped() {
        let (backend, _) = seeded().await;
        let poller = NotificationPoller::new(
            backend.clone(),
            backend.clone(),
            SessionContext::new("depa.head"),
            Duration::from_secs(60),
        );
        let handle = tokio::spawn(poller.clone().run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(poller.is_running().await);
        assert!(poller.snapshot().await.polled_at.is_some());

        poller.stop().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.await.unwrap();
        assert!(!poller.is_running().await);
    }
}
