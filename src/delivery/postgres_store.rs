//! PostgreSQL-backed delivery store.
//!
//! Transitions are a single status-guarded UPDATE, so the row-level write
//! is atomic with respect to concurrent readers and no two concurrent
//! transitions can both apply to the same record.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::record::{
    Channel, DeliveryRecord, DeliveryStatus, StatusChange, ERROR_MESSAGE_MAX_LEN,
};
use super::store::{DeliveryStore, PageRequest, StoreError};

pub struct PostgresDeliveryStore {
    pool: PgPool,
}

impl PostgresDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RECORD_COLUMNS: &str = "id, tenant_id, recipient, channel, subject, body, status, \
                              created_at, sent_at, error_message, retry_count";

fn row_to_record(row: &PgRow) -> Result<DeliveryRecord, StoreError> {
    let channel_code: i16 = row.try_get("channel")?;
    let channel = Channel::from_i16(channel_code).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("invalid channel code {}", channel_code).into(),
        ))
    })?;

    let status_code: i16 = row.try_get("status")?;
    let status = DeliveryStatus::from_i16(status_code).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("invalid status code {}", status_code).into(),
        ))
    })?;

    let retry_count: i32 = row.try_get("retry_count")?;

    Ok(DeliveryRecord {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        recipient: row.try_get("recipient")?,
        channel,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        status,
        created_at: row.try_get("created_at")?,
        sent_at: row.try_get("sent_at")?,
        error_message: row.try_get("error_message")?,
        retry_count: retry_count.max(0) as u32,
    })
}

#[async_trait]
impl DeliveryStore for PostgresDeliveryStore {
    async fn insert(&self, record: &DeliveryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO deliveries
                (id, tenant_id, recipient, channel, subject, body, status,
                 created_at, sent_at, error_message, retry_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(&record.recipient)
        .bind(record.channel.as_i16())
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.status.as_i16())
        .bind(record.created_at)
        .bind(record.sent_at)
        .bind(&record.error_message)
        .bind(record.retry_count as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DeliveryRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM deliveries WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM deliveries \
             WHERE tenant_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id)
        .bind(page.page_size as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        change: StatusChange,
    ) -> Result<DeliveryRecord, StoreError> {
        let expected = change.expected_status();

        let row = match &change {
            StatusChange::Sent { at } => {
                sqlx::query(&format!(
                    "UPDATE deliveries \
                     SET status = $1, sent_at = $2, error_message = NULL \
                     WHERE id = $3 AND tenant_id = $4 AND status = $5 \
                     RETURNING {RECORD_COLUMNS}"
                ))
                .bind(DeliveryStatus::Sent.as_i16())
                .bind(at)
                .bind(id)
                .bind(tenant_id)
                .bind(expected.as_i16())
                .fetch_optional(&self.pool)
                .await?
            }
            StatusChange::Failed { reason } => {
                // Bounded to the column width so the guarded UPDATE cannot
                // fail on an oversized gateway response
                let reason: String = reason.chars().take(ERROR_MESSAGE_MAX_LEN).collect();
                sqlx::query(&format!(
                    "UPDATE deliveries \
                     SET status = $1, error_message = $2, retry_count = retry_count + 1 \
                     WHERE id = $3 AND tenant_id = $4 AND status = $5 \
                     RETURNING {RECORD_COLUMNS}"
                ))
                .bind(DeliveryStatus::Failed.as_i16())
                .bind(reason)
                .bind(id)
                .bind(tenant_id)
                .bind(expected.as_i16())
                .fetch_optional(&self.pool)
                .await?
            }
            StatusChange::PendingRetry => {
                sqlx::query(&format!(
                    "UPDATE deliveries \
                     SET status = $1, error_message = NULL \
                     WHERE id = $2 AND tenant_id = $3 AND status = $4 \
                     RETURNING {RECORD_COLUMNS}"
                ))
                .bind(DeliveryStatus::Pending.as_i16())
                .bind(id)
                .bind(tenant_id)
                .bind(expected.as_i16())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        if let Some(row) = row {
            return row_to_record(&row);
        }

        // The guarded UPDATE matched nothing: either the record does not
        // exist for this tenant, or it is in a different status.
        match self.find(tenant_id, id).await? {
            None => Err(StoreError::NotFound),
            Some(current) => Err(StoreError::Conflict {
                expected,
                actual: current.status,
            }),
        }
    }
}
