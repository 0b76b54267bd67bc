use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::log_entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        })
    }
}

/// Writes to the `brt_logs` table. Recording never fails the caller.
#[derive(Clone)]
pub struct AuditLog {
    db: Arc<DbPool>,
}

impl AuditLog {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: Value,
        actor: Option<&str>,
    ) {
        let message = message.into();
        let context = match context {
            Value::Null => None,
            other => Some(other.to_string()),
        };
        let entry = log_entry::ActiveModel {
            level: Set(level.to_string()),
            message: Set(message.clone()),
            context: Set(context),
            actor: Set(actor.map(str::to_string)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = entry.insert(&*self.db).await {
            warn!(error = %e, %message, "could not write audit entry");
        }
    }

    pub async fn info(&self, message: impl Into<String>, context: Value, actor: Option<&str>) {
        self.record(LogLevel::Info, message, context, actor).await
    }

    pub async fn warning(&self, message: impl Into<String>, context: Value, actor: Option<&str>) {
        self.record(LogLevel::Warning, message, context, actor).await
    }

    pub async fn error(&self, message: impl Into<String>, context: Value, actor: Option<&str>) {
        self.record(LogLevel::Error, message, context, actor).await
    }

    /// Newest first.
    pub async fn list(
        &self,
        level: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<log_entry::Model>, u64), ServiceError> {
        let mut query = log_entry::Entity::find().order_by_desc(log_entry::Column::Id);
        if let Some(level) = level {
            query = query.filter(log_entry::Column::Level.eq(level));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }
}
