//! Stateless estimate endpoints for the marketing site.
//!
//! - `POST /api/estimate`      — price range for a project type and square footage
//! - `POST /api/estimate-form` — validated scheduling redirect for the estimate form

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use leadline_core::errors::{ApplicationError, DomainError};
use leadline_core::estimate_form::{EstimateForm, EstimateFormError, EstimateRequest};
use leadline_core::pricing::{estimate, parse_sqft, PricingTable};
use leadline_core::{BusinessInfo, EstimateRange};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::{bad_request, from_application, from_domain, ApiError, ApiResult};

#[derive(Clone)]
pub struct EstimateState {
    business: BusinessInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateQuery {
    pub project_type: String,
    /// Number or free text such as `"1,200 sq ft"`.
    pub sqft: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub project_type: String,
    pub label: String,
    pub sqft: Decimal,
    pub range: EstimateRange,
    pub display: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateFormResponse {
    pub redirect_url: String,
    pub notes: String,
}

pub fn router(business: BusinessInfo) -> Router {
    Router::new()
        .route("/api/estimate", post(price_project))
        .route("/api/estimate-form", post(submit_estimate_form))
        .with_state(EstimateState { business })
}

async fn price_project(Json(query): Json<EstimateQuery>) -> ApiResult<EstimateResponse> {
    let correlation_id = Uuid::new_v4().to_string();

    let rule = PricingTable
        .find(query.project_type.trim())
        .or_else(|| PricingTable.match_text(&query.project_type.to_lowercase()))
        .ok_or_else(|| {
            from_domain(DomainError::UnknownProject(query.project_type.clone()), &correlation_id)
        })?;

    let sqft = match &query.sqft {
        Value::Number(number) => parse_sqft(&number.to_string()),
        Value::String(text) => parse_sqft(text),
        _ => None,
    }
    .ok_or_else(|| bad_request("sqft must be a positive number", &correlation_id))?;

    let range = estimate(rule, sqft)
        .ok_or_else(|| bad_request("sqft is too large to price", &correlation_id))?;
    info!(
        event_name = "estimate.priced",
        correlation_id = %correlation_id,
        project_type = rule.key,
        sqft = %sqft,
        within_typical_range = range.within_typical_range,
        "estimate range computed"
    );

    Ok(Json(EstimateResponse {
        project_type: rule.key.to_string(),
        label: rule.label_en.to_string(),
        sqft,
        display: range.display(),
        range,
    }))
}

/// Runs the whole form in one shot: step checks, submission and redirect.
async fn submit_estimate_form(
    State(state): State<EstimateState>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateFormResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();
    let fail = |error| from_domain(DomainError::EstimateForm(error), &correlation_id);

    let mut form = EstimateForm::new();
    form.select_service(&request.service).map_err(fail)?;
    if !request.timeline.is_empty() {
        form.select_timeline(&request.timeline).map_err(fail)?;
    }
    if !request.budget.is_empty() {
        form.select_budget(&request.budget).map_err(fail)?;
    }
    {
        let fields = form.request_mut();
        fields.name = request.name.trim().to_string();
        fields.email = request.email.trim().to_string();
        fields.phone = request.phone.trim().to_string();
        fields.details = request.details;
    }
    form.begin_submit().map_err(fail)?;
    let redirect = form.complete(&state.business.scheduling_url).map_err(|error| match error {
        EstimateFormError::InvalidSchedulingUrl { .. } => {
            from_application(ApplicationError::Configuration(error.to_string()), &correlation_id)
        }
        other => fail(other),
    })?;

    info!(
        event_name = "estimate_form.submitted",
        correlation_id = %correlation_id,
        service = %form.request().service,
        "estimate form accepted"
    );

    Ok(Json(EstimateFormResponse { redirect_url: redirect.to_string(), notes: form.request().notes() }))
}
