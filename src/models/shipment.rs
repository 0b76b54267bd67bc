use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::carrier::ShipmentKey;

/// Local view of the carrier-side shipment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    /// Created with a non-zero execution code
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::Confirmed => "confirmed",
            ShipmentStatus::Warning => "warning",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a manifest may include
    pub fn manifestable() -> [ShipmentStatus; 3] {
        [
            ShipmentStatus::Confirmed,
            ShipmentStatus::Warning,
            ShipmentStatus::Created,
        ]
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(ShipmentStatus::Created),
            "confirmed" => Ok(ShipmentStatus::Confirmed),
            "warning" => Ok(ShipmentStatus::Warning),
            "cancelled" => Ok(ShipmentStatus::Cancelled),
            other => Err(format!("unknown shipment status: {}", other)),
        }
    }
}

/// A shipment registered with BRT. Carrier identity is
/// (`sender_customer_code`, `numeric_reference`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brt_shipments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub sender_customer_code: String,
    pub numeric_reference: i64,
    pub alphanumeric_reference: Option<String>,

    pub departure_depot: Option<String>,
    pub arrival_terminal: Option<String>,
    pub arrival_depot: Option<String>,
    pub delivery_zone: Option<String>,
    pub parcel_number_from: Option<String>,
    pub parcel_number_to: Option<String>,

    pub number_of_parcels: i32,
    pub weight_kg: f64,
    pub volume_m3: Option<f64>,

    pub consignee_name: String,
    pub consignee_address: String,
    pub consignee_zip: String,
    pub consignee_city: String,
    pub consignee_province: Option<String>,
    pub consignee_country: String,
    pub consignee_email: Option<String>,
    pub consignee_phone: Option<String>,

    pub status: ShipmentStatus,
    pub execution_code: Option<i64>,
    pub execution_description: Option<String>,
    pub execution_message: Option<String>,

    pub label_path: Option<String>,
    pub parcel_id: Option<String>,
    pub tracking_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub tracking_payload: Option<String>,
    pub tracking_updated_at: Option<DateTime<Utc>>,

    pub manifest_id: Option<i32>,
    pub manifest_generated_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,

    /// `{"request": ..., "meta": ...}`
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub request_payload: Option<String>,
    /// Raw carrier response
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub response_payload: Option<String>,

    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manifest::Entity",
        from = "Column::ManifestId",
        to = "super::manifest::Column::Id",
        on_delete = "SetNull"
    )]
    Manifest,

    #[sea_orm(has_one = "super::customs_document::Entity")]
    CustomsDocument,
}

impl Related<super::manifest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manifest.def()
    }
}

impl Related<super::customs_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomsDocument.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Manifested shipments can no longer be edited, cancelled or deleted.
    pub fn is_manifested(&self) -> bool {
        self.manifest_id.is_some()
    }

    /// Soft-deleted, i.e. cancelled on the carrier side.
    pub fn is_cancelled(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_manifest_eligible(&self) -> bool {
        !self.is_manifested()
            && !self.is_cancelled()
            && ShipmentStatus::manifestable().contains(&self.status)
    }

    pub fn carrier_key(&self) -> ShipmentKey {
        ShipmentKey {
            sender_customer_code: self.sender_customer_code.clone(),
            numeric_sender_reference: self.numeric_reference,
            alphanumeric_sender_reference: self.alphanumeric_reference.clone(),
        }
    }
}
