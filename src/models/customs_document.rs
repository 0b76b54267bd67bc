use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CustomsStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "generated")]
    Generated,
    #[sea_orm(string_value = "error")]
    Error,
}

impl fmt::Display for CustomsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CustomsStatus::Pending => "pending",
            CustomsStatus::Generated => "generated",
            CustomsStatus::Error => "error",
        })
    }
}

/// Commercial invoice + customs declaration for one shipment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brt_customs_documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub shipment_id: i32,
    pub status: CustomsStatus,
    pub category: String,
    pub goods_description: String,
    pub goods_value: Decimal,
    pub goods_currency: String,
    pub goods_origin_country: String,
    pub hs_code: Option<String>,
    pub incoterm: String,
    pub sender_vat: Option<String>,
    pub sender_eori: Option<String>,
    pub receiver_vat: Option<String>,
    pub receiver_eori: Option<String>,
    pub notes: Option<String>,
    pub invoice_path: Option<String>,
    pub declaration_path: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::shipment::Column::Id",
        on_delete = "Cascade"
    )]
    Shipment,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn file_paths(&self) -> Vec<&str> {
        [self.invoice_path.as_deref(), self.declaration_path.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}
