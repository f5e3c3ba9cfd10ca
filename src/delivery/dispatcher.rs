use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::provider::{ProviderRegistry, SendError};
use crate::retry::ExponentialBackoff;

use super::record::{Channel, DeliveryRecord, DeliveryStatus, StatusChange};
use super::store::{DeliveryStore, StoreError};

/// Schema bounds on recipient and subject length (mirror the persisted
/// column widths)
const RECIPIENT_MAX_LEN: usize = 500;
const SUBJECT_MAX_LEN: usize = 500;

/// A delivery request as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDelivery {
    pub recipient: String,
    pub channel: Channel,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Errors surfaced synchronously by dispatcher operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("delivery record not found")]
    NotFound,

    #[error("invalid state: record is {actual}, expected {expected}")]
    InvalidState {
        expected: DeliveryStatus,
        actual: DeliveryStatus,
    },

    #[error("retry limit reached after {attempts} failed attempts")]
    RetryExhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Records created via submit
    pub submitted: AtomicU64,
    /// Send attempts that transitioned a record to Sent
    pub sent: AtomicU64,
    /// Send attempts that transitioned a record to Failed
    pub failed: AtomicU64,
    /// Operator-triggered retries accepted
    pub retried: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub submitted: u64,
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
}

/// Orchestrates creation, asynchronous send, status transitions and retry
/// bookkeeping for delivery records.
///
/// Every send attempt is an explicit task the dispatcher owns: the spawned
/// handle is kept in an in-flight map so tests and shutdown paths can await
/// its completion via [`Dispatcher::await_send`] instead of racing
/// uncoordinated background work.
pub struct Dispatcher {
    store: Arc<dyn DeliveryStore>,
    registry: Arc<ProviderRegistry>,
    config: DispatchConfig,
    in_flight: DashMap<Uuid, JoinHandle<()>>,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn DeliveryStore>,
        registry: Arc<ProviderRegistry>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            in_flight: DashMap::new(),
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// Get dispatcher counters
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Accept a delivery request: validate, persist a Pending record, and
    /// schedule exactly one send attempt. Returns the new record id as soon
    /// as the record is durable; the caller observes only "queued".
    #[tracing::instrument(
        name = "dispatcher.submit",
        skip(self, request),
        fields(tenant_id = %tenant_id, channel = %request.channel)
    )]
    pub async fn submit(
        &self,
        tenant_id: Uuid,
        request: NewDelivery,
    ) -> Result<Uuid, DispatchError> {
        let recipient = request.recipient.trim();
        if recipient.is_empty() {
            return Err(DispatchError::Validation(
                "recipient must not be empty".to_string(),
            ));
        }
        if recipient.len() > RECIPIENT_MAX_LEN {
            return Err(DispatchError::Validation(format!(
                "recipient exceeds {} characters",
                RECIPIENT_MAX_LEN
            )));
        }
        if request.subject.chars().count() > SUBJECT_MAX_LEN {
            return Err(DispatchError::Validation(format!(
                "subject exceeds {} characters",
                SUBJECT_MAX_LEN
            )));
        }

        let record = DeliveryRecord::new(
            tenant_id,
            recipient,
            request.channel,
            request.subject,
            request.body,
        );
        let id = record.id;

        // The initial persist must complete before the send attempt is
        // scheduled; a failed persist means no record and no attempt.
        self.store.insert(&record).await?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);

        self.schedule_send(tenant_id, id);

        tracing::info!(notification_id = %id, "Delivery record queued");
        Ok(id)
    }

    /// Re-queue a failed record for another send attempt.
    ///
    /// Legal only from Failed, and refused once the record has burned
    /// through the configured retry ceiling. Any other state is left
    /// untouched and reported as an error.
    #[tracing::instrument(
        name = "dispatcher.retry",
        skip(self),
        fields(tenant_id = %tenant_id, notification_id = %id)
    )]
    pub async fn retry(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DispatchError> {
        let record = self
            .store
            .find(tenant_id, id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        if record.status != DeliveryStatus::Failed {
            return Err(DispatchError::InvalidState {
                expected: DeliveryStatus::Failed,
                actual: record.status,
            });
        }
        if record.retry_count >= self.config.max_retries {
            return Err(DispatchError::RetryExhausted {
                attempts: record.retry_count,
            });
        }

        // Compare-and-set guards against a concurrent retry of the same
        // record: only one caller wins the Failed -> Pending transition.
        match self
            .store
            .transition(tenant_id, id, StatusChange::PendingRetry)
            .await
        {
            Ok(_) => {}
            Err(StoreError::Conflict { expected, actual }) => {
                return Err(DispatchError::InvalidState { expected, actual });
            }
            Err(StoreError::NotFound) => return Err(DispatchError::NotFound),
            Err(e) => return Err(e.into()),
        }

        self.stats.retried.fetch_add(1, Ordering::Relaxed);
        self.schedule_send(tenant_id, id);

        tracing::info!(notification_id = %id, "Delivery record re-queued");
        Ok(())
    }

    /// Await the completion of a scheduled send attempt for this record.
    ///
    /// Returns immediately if no attempt is in flight (already completed
    /// and reaped, or never scheduled).
    pub async fn await_send(&self, id: Uuid) {
        if let Some((_, handle)) = self.in_flight.remove(&id) {
            let _ = handle.await;
        }
    }

    /// Number of send attempts currently tracked.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Await completion of every tracked send attempt.
    ///
    /// Called on shutdown so scheduled attempts run to completion instead
    /// of being dropped mid-flight with the process.
    pub async fn drain(&self) {
        let ids: Vec<Uuid> = self.in_flight.iter().map(|entry| *entry.key()).collect();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, handle)) = self.in_flight.remove(&id) {
                handles.push(handle);
            }
        }
        if !handles.is_empty() {
            tracing::info!(count = handles.len(), "Draining in-flight send attempts");
            futures::future::join_all(handles).await;
        }
    }

    fn schedule_send(&self, tenant_id: Uuid, id: Uuid) {
        // Reap handles of attempts that already ran to completion
        self.in_flight.retain(|_, handle| !handle.is_finished());

        let worker = SendWorker {
            store: self.store.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            stats: self.stats.clone(),
        };
        let handle = tokio::spawn(async move {
            worker.run_send(tenant_id, id).await;
        });
        self.in_flight.insert(id, handle);
    }
}

/// The cloneable slice of dispatcher state a spawned send attempt needs.
struct SendWorker {
    store: Arc<dyn DeliveryStore>,
    registry: Arc<ProviderRegistry>,
    config: DispatchConfig,
    stats: Arc<DispatcherStats>,
}

impl SendWorker {
    /// One asynchronous send attempt: resolve the provider, invoke it, and
    /// persist the resulting transition.
    #[tracing::instrument(
        name = "dispatcher.send_attempt",
        skip(self),
        fields(tenant_id = %tenant_id, notification_id = %id)
    )]
    async fn run_send(&self, tenant_id: Uuid, id: Uuid) {
        let record = match self.store.find(tenant_id, id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::error!(notification_id = %id, "Record vanished before send attempt");
                return;
            }
            Err(e) => {
                tracing::error!(
                    notification_id = %id,
                    error = %e,
                    "Failed to load record for send attempt"
                );
                return;
            }
        };

        if record.status != DeliveryStatus::Pending {
            tracing::warn!(
                notification_id = %id,
                status = %record.status,
                "Skipping send attempt for non-pending record"
            );
            return;
        }

        let outcome = match self.registry.resolve(record.channel) {
            Some(provider) => provider.send(&record).await,
            None => Err(no_provider_error(record.channel)),
        };

        let change = match outcome {
            Ok(()) => StatusChange::Sent { at: Utc::now() },
            Err(e) => {
                tracing::warn!(
                    notification_id = %id,
                    channel = %record.channel,
                    error = %e,
                    "Send attempt failed"
                );
                StatusChange::Failed { reason: e.reason }
            }
        };

        self.persist_transition(tenant_id, id, change).await;
    }

    /// Persist a status transition with bounded attempts. Transient store
    /// failures are retried with exponential backoff; exhaustion is logged
    /// at error level so the loss is never silent.
    async fn persist_transition(&self, tenant_id: Uuid, id: Uuid, change: StatusChange) {
        let max_attempts = self.config.persist_attempts.max(1);
        let mut backoff = ExponentialBackoff::new();

        for attempt in 1..=max_attempts {
            match self.store.transition(tenant_id, id, change.clone()).await {
                Ok(record) => {
                    match record.status {
                        DeliveryStatus::Sent => {
                            self.stats.sent.fetch_add(1, Ordering::Relaxed);
                        }
                        DeliveryStatus::Failed => {
                            self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        DeliveryStatus::Pending => {}
                    }
                    tracing::debug!(
                        notification_id = %id,
                        status = %record.status,
                        retry_count = record.retry_count,
                        "Transition persisted"
                    );
                    return;
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        notification_id = %id,
                        attempt = attempt,
                        error = %e,
                        "Transition persist failed, backing off"
                    );
                    tokio::time::sleep(backoff.next_delay()).await;
                }
                Err(e) => {
                    tracing::error!(
                        notification_id = %id,
                        attempts = attempt,
                        error = %e,
                        "Dropping status transition after persistent store failure"
                    );
                    return;
                }
            }
        }
    }
}

fn no_provider_error(channel: Channel) -> SendError {
    SendError::new(format!("no provider registered for channel {}", channel))
}
