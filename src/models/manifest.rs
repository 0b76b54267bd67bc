use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A batch of shipments handed to the carrier. Totals are a snapshot taken at
/// generation time.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brt_manifests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub reference: String,
    pub official_number: Option<String>,
    pub official_url: Option<String>,
    pub official_pdf_path: Option<String>,
    pub pdf_path: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub shipment_count: i32,
    pub parcel_count: i32,
    pub total_weight_kg: f64,
    pub total_volume_m3: f64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
