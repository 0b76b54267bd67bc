//! Numeric sender reference generation.
//!
//! The next reference is `max(MAX(stored refs for sender), floor) + 1`, where the
//! floor is the larger of the caller's minimum and the highest value already
//! handed out in this process. Gaps are fine; reuse is not.

use dashmap::DashMap;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use std::sync::Arc;
use tracing::debug;

use crate::errors::ServiceError;
use crate::models::shipment;

/// High-water mark of references issued per sender.
pub trait ReferenceSession: Send + Sync {
    fn peek(&self, sender: &str) -> Option<i64>;
    /// Records `value`, keeping the maximum already seen.
    fn commit(&self, sender: &str, value: i64);
}

#[derive(Debug, Default)]
pub struct InMemoryReferenceSession {
    issued: DashMap<String, i64>,
}

impl InMemoryReferenceSession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceSession for InMemoryReferenceSession {
    fn peek(&self, sender: &str) -> Option<i64> {
        self.issued.get(sender).map(|v| *v)
    }

    fn commit(&self, sender: &str, value: i64) {
        self.issued
            .entry(sender.to_string())
            .and_modify(|current| {
                if value > *current {
                    *current = value;
                }
            })
            .or_insert(value);
    }
}

/// Highest numeric reference stored for `sender`, soft-deleted rows included.
pub async fn max_stored_reference<C: ConnectionTrait>(
    db: &C,
    sender: &str,
) -> Result<Option<i64>, ServiceError> {
    let max = shipment::Entity::find()
        .select_only()
        .column_as(shipment::Column::NumericReference.max(), "max_reference")
        .filter(shipment::Column::SenderCustomerCode.eq(sender))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten();
    Ok(max)
}

pub async fn next_numeric_reference<C: ConnectionTrait>(
    db: &C,
    sender: &str,
    minimum: i64,
) -> Result<i64, ServiceError> {
    let stored = max_stored_reference(db, sender).await?.unwrap_or(0);
    Ok(stored.max(minimum).max(0) + 1)
}

/// Combines the stored maximum with the session high-water mark.
#[derive(Clone)]
pub struct ReferenceAllocator {
    session: Arc<dyn ReferenceSession>,
}

impl ReferenceAllocator {
    pub fn new(session: Arc<dyn ReferenceSession>) -> Self {
        Self { session }
    }

    /// Next reference strictly above `minimum` and above anything issued before.
    /// The value is recorded in the session immediately.
    pub async fn reserve<C: ConnectionTrait>(
        &self,
        db: &C,
        sender: &str,
        minimum: i64,
    ) -> Result<i64, ServiceError> {
        let floor = self.session.peek(sender).unwrap_or(0).max(minimum);
        let next = next_numeric_reference(db, sender, floor).await?;
        self.session.commit(sender, next);
        debug!(sender, next, "numeric reference reserved");
        Ok(next)
    }

    /// Records a reference that was accepted by the carrier.
    pub fn commit(&self, sender: &str, value: i64) {
        self.session.commit(sender, value);
    }

    pub fn peek(&self, sender: &str) -> Option<i64> {
        self.session.peek(sender)
    }
}
