use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum OrmStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "error")]
    Error,
    #[sea_orm(string_value = "updated")]
    Updated,
    #[sea_orm(string_value = "synced")]
    Synced,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "cancel_failed")]
    CancelFailed,
}

impl OrmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrmStatus::Pending => "pending",
            OrmStatus::Confirmed => "confirmed",
            OrmStatus::Error => "error",
            OrmStatus::Updated => "updated",
            OrmStatus::Synced => "synced",
            OrmStatus::Cancelled => "cancelled",
            OrmStatus::CancelFailed => "cancel_failed",
        }
    }

    /// A reservation exists on the carrier side in these states.
    pub fn has_reservation(&self) -> bool {
        matches!(
            self,
            OrmStatus::Confirmed | OrmStatus::Updated | OrmStatus::Synced | OrmStatus::CancelFailed
        )
    }
}

impl fmt::Display for OrmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrmStatus::Pending),
            "confirmed" => Ok(OrmStatus::Confirmed),
            "error" => Ok(OrmStatus::Error),
            "updated" => Ok(OrmStatus::Updated),
            "synced" => Ok(OrmStatus::Synced),
            "cancelled" => Ok(OrmStatus::Cancelled),
            "cancel_failed" => Ok(OrmStatus::CancelFailed),
            other => Err(format!("unknown pickup status: {}", other)),
        }
    }
}

/// A pickup reservation request submitted to the ORM service.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brt_orm_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub reservation_number: Option<String>,
    pub status: OrmStatus,
    pub remote_status: Option<String>,
    pub collection_date: NaiveDate,
    pub payer_type: String,
    pub number_of_parcels: i32,
    pub weight_kg: f64,
    #[sea_orm(column_type = "Text", nullable)]
    pub request_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub response_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_request_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_response_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub remote_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub form_payload: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub errors_payload: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
