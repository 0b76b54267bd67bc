use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    carrier::{PudoPoint, PudoQuery},
    ApiResponse, ApiResult, AppState,
};

const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct PudoSearchQuery {
    #[validate(length(equal = 2))]
    pub country: Option<String>,
    #[validate(length(min = 1, max = 9))]
    pub zip: String,
    pub city: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1, max = 50))]
    pub max_results: Option<u32>,
}

/// Pickup points near an address, straight from the carrier.
pub async fn search_pudo(
    State(state): State<AppState>,
    Query(query): Query<PudoSearchQuery>,
) -> ApiResult<Vec<PudoPoint>> {
    query.validate()?;
    let lookup = PudoQuery {
        country_code: query
            .country
            .as_deref()
            .unwrap_or("IT")
            .to_ascii_uppercase(),
        zip_code: query.zip.trim().to_string(),
        city: query.city.filter(|c| !c.trim().is_empty()),
        address: query.address.filter(|a| !a.trim().is_empty()),
        max_results: query.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
    };
    let points = state.services.pudo.search(&lookup).await?;
    Ok(Json(ApiResponse::success(points)))
}
