//! Post-commit notifications.
//!
//! Services only obtain a [`PostCommit`] by committing their transaction, so a
//! notification can never run inside (or roll back) the write it announces.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use sea_orm::{DatabaseTransaction, DbErr};
use serde::Serialize;

use crate::{models::Booking, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    Confirmed,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking: Booking,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::info!(
            kind = ?event.kind,
            booking_id = %event.booking.id,
            code = %event.booking.code,
            email = event.customer_email.as_deref().unwrap_or("-"),
            "booking notification"
        );
        Ok(())
    }
}

/// Posts the event as JSON to a mail/chat relay.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Hands each event to a spawned task so slow delivery never holds up the
/// request that produced it.
pub struct BackgroundNotifier {
    inner: Arc<dyn Notifier>,
}

impl BackgroundNotifier {
    pub fn new(inner: Arc<dyn Notifier>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Notifier for BackgroundNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        let inner = Arc::clone(&self.inner);
        let event = event.clone();
        tokio::spawn(async move {
            if let Err(err) = inner.notify(&event).await {
                tracing::warn!(
                    error = %err,
                    booking_id = %event.booking.id,
                    kind = ?event.kind,
                    "booking notification failed"
                );
            }
        });
        Ok(())
    }
}

/// Events released by a successful commit.
#[must_use = "post-commit events are dropped unless dispatched"]
pub struct PostCommit {
    events: Vec<BookingEvent>,
}

impl PostCommit {
    /// Deliver every event; failures are logged and swallowed.
    pub async fn dispatch(self, state: &AppState) {
        for event in self.events {
            if let Err(err) = state.notifier.notify(&event).await {
                tracing::warn!(
                    error = %err,
                    booking_id = %event.booking.id,
                    kind = ?event.kind,
                    "booking notification failed"
                );
            }
        }
    }
}

pub async fn commit(
    txn: DatabaseTransaction,
    events: Vec<BookingEvent>,
) -> Result<PostCommit, DbErr> {
    txn.commit().await?;
    Ok(PostCommit { events })
}
