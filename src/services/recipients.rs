use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
    TryIntoModel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::models::saved_recipient;

/// Address book entry as submitted; `label` is the natural key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct RecipientInput {
    #[validate(length(min = 1, max = 100))]
    pub label: String,
    #[validate(length(min = 1, max = 70))]
    pub company_name: String,
    #[validate(length(min = 1, max = 105))]
    pub address: String,
    #[validate(length(min = 1, max = 9))]
    pub zip: String,
    #[validate(length(min = 1, max = 35))]
    pub city: String,
    #[serde(default)]
    pub province: Option<String>,
    #[validate(length(equal = 2))]
    pub country: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct RecipientService {
    db: Arc<DbPool>,
}

impl RecipientService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Inserts or overwrites the entry with the same label.
    #[instrument(skip(self, input), fields(label = %input.label))]
    pub async fn upsert(&self, input: RecipientInput) -> Result<saved_recipient::Model, ServiceError> {
        input.validate()?;
        let label = input.label.trim().to_string();
        let now = Utc::now();

        let existing = saved_recipient::Entity::find()
            .filter(saved_recipient::Column::Label.eq(label.as_str()))
            .one(&*self.db)
            .await?;

        let mut active = match existing {
            Some(row) => row.into_active_model(),
            None => saved_recipient::ActiveModel {
                label: Set(label.clone()),
                created_at: Set(now),
                ..Default::default()
            },
        };
        active.company_name = Set(input.company_name);
        active.address = Set(input.address);
        active.zip = Set(input.zip);
        active.city = Set(input.city);
        active.province = Set(input.province);
        active.country = Set(input.country.to_ascii_uppercase());
        active.contact_name = Set(input.contact_name);
        active.phone = Set(input.phone);
        active.email = Set(input.email);
        active.updated_at = Set(now);

        let saved = active.save(&*self.db).await?.try_into_model()?;
        info!(recipient_id = saved.id, "recipient saved");
        Ok(saved)
    }

    pub async fn list(&self) -> Result<Vec<saved_recipient::Model>, ServiceError> {
        Ok(saved_recipient::Entity::find()
            .order_by_asc(saved_recipient::Column::Label)
            .all(&*self.db)
            .await?)
    }

    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let result = saved_recipient::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Recipient", id));
        }
        Ok(())
    }
}
