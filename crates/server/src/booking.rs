//! Scheduling proxy that keeps the Cal.com API key on the server.
//!
//! - `GET  /api/cal?action=slots&eventTypeId=&startTime=&endTime=` — available slots
//! - `POST /api/cal?action=book`                                   — create a booking
//! - `OPTIONS /api/cal`                                            — CORS preflight
//!
//! Every response carries permissive CORS headers.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use leadline_core::config::BookingConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};
use url::Url;

const SOURCE: &str = "website_chatbot";
const BOOKING_LANGUAGE: &str = "en";

#[derive(Clone)]
pub struct BookingState {
    client: Client,
    api_key: Option<SecretString>,
    api_base_url: String,
    default_time_zone: String,
}

impl BookingState {
    pub fn from_config(config: &BookingConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            default_time_zone: config.default_time_zone.clone(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalQuery {
    pub action: Option<String>,
    pub event_type_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Loosely typed so that blank strings and numeric ids are both accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BookRequest {
    pub event_type_id: Value,
    pub start: Value,
    pub name: Value,
    pub email: Value,
    pub phone: Value,
    pub time_zone: Value,
    pub estimate_range: Value,
}

pub fn router(state: BookingState) -> Router {
    Router::new()
        .route("/api/cal", any(cal))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

async fn cal(
    method: Method,
    State(state): State<BookingState>,
    Query(query): Query<CalQuery>,
    body: Bytes,
) -> Response {
    let Some(api_key) = state.api_key.as_ref() else {
        error!(
            event_name = "booking.api_key_missing",
            correlation_id = "booking",
            "booking proxy called without a configured API key"
        );
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Cal.com API key not configured");
    };

    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    match (method, query.action.as_deref()) {
        (Method::GET, Some("slots")) => slots(&state, api_key, &query).await,
        (Method::POST, Some("book")) => book(&state, api_key, &body).await,
        _ => error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request. Use ?action=slots or ?action=book",
        ),
    }
}

async fn slots(state: &BookingState, api_key: &SecretString, query: &CalQuery) -> Response {
    let Some(event_type_id) = query.event_type_id.as_deref().filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "eventTypeId required");
    };

    let url = match upstream_url(state, "slots", api_key) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(start_time) = query.start_time.as_deref() {
                    pairs.append_pair("startTime", start_time);
                }
                if let Some(end_time) = query.end_time.as_deref() {
                    pairs.append_pair("endTime", end_time);
                }
                pairs.append_pair("eventTypeId", event_type_id);
            }
            url
        }
        Err(message) => return internal_error(message),
    };

    info!(
        event_name = "booking.slots.requested",
        correlation_id = "booking",
        event_type_id,
        "fetching available slots"
    );
    let request = state.client.get(url).header(header::CONTENT_TYPE, "application/json");
    forward(request, "Failed to fetch slots").await
}

async fn book(state: &BookingState, api_key: &SecretString, body: &Bytes) -> Response {
    let request: BookRequest = serde_json::from_slice(body).unwrap_or_default();
    if ![&request.event_type_id, &request.start, &request.name, &request.email]
        .into_iter()
        .all(is_present)
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: eventTypeId, start, name, email",
        );
    }

    let url = match upstream_url(state, "bookings", api_key) {
        Ok(url) => url,
        Err(message) => return internal_error(message),
    };
    let payload = booking_payload(&request, &state.default_time_zone);

    info!(
        event_name = "booking.create.requested",
        correlation_id = "booking",
        event_type_id = %payload["eventTypeId"],
        "creating booking"
    );
    forward(state.client.post(url).json(&payload), "Failed to create booking").await
}

/// The upstream booking body: contact answers, notes mentioning the estimate
/// when one was given, and chatbot attribution.
pub fn booking_payload(request: &BookRequest, default_time_zone: &str) -> Value {
    let estimate_range = request.estimate_range.as_str().filter(|range| !range.is_empty());

    let mut responses = Map::new();
    responses.insert("name".to_string(), request.name.clone());
    responses.insert("email".to_string(), request.email.clone());
    if is_present(&request.phone) {
        responses.insert("phone".to_string(), request.phone.clone());
    }
    let notes = match estimate_range {
        Some(range) => format!("Project Estimate: {range}\nRequested via website chatbot"),
        None => "Requested via website chatbot".to_string(),
    };
    responses.insert("notes".to_string(), Value::String(notes));

    let time_zone = request
        .time_zone
        .as_str()
        .filter(|zone| !zone.is_empty())
        .unwrap_or(default_time_zone);

    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(SOURCE.to_string()));
    if !request.estimate_range.is_null() {
        metadata.insert("estimateRange".to_string(), request.estimate_range.clone());
    }

    json!({
        "eventTypeId": event_type_id(&request.event_type_id),
        "start": request.start,
        "responses": responses,
        "timeZone": time_zone,
        "language": BOOKING_LANGUAGE,
        "metadata": metadata,
    })
}

/// Integer prefix of the id, or `null` when there is none.
fn event_type_id(value: &Value) -> Value {
    match value {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|f| f.trunc() as i64)).into()
        }
        Value::String(text) => {
            let text = text.trim();
            let sign_len = usize::from(text.starts_with('-') || text.starts_with('+'));
            let digits = text[sign_len..].chars().take_while(char::is_ascii_digit).count();
            text[..sign_len + digits].parse::<i64>().ok().into()
        }
        _ => Value::Null,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn upstream_url(state: &BookingState, resource: &str, api_key: &SecretString) -> Result<Url, String> {
    let mut url = Url::parse(&format!("{}/v1/{resource}", state.api_base_url))
        .map_err(|error| format!("invalid booking API base url: {error}"))?;
    url.query_pairs_mut().append_pair("apiKey", api_key.expose_secret());
    Ok(url)
}

async fn forward(request: reqwest::RequestBuilder, failure: &'static str) -> Response {
    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => return internal_error(error.without_url().to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        warn!(
            event_name = "booking.upstream_error",
            correlation_id = "booking",
            status = %status,
            details = %details,
            "{failure}"
        );
        return (status, Json(json!({ "error": failure, "details": details }))).into_response();
    }

    match response.json::<Value>().await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(error) => internal_error(error.without_url().to_string()),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn internal_error(message: String) -> Response {
    error!(
        event_name = "booking.internal_error",
        correlation_id = "booking",
        error = %message,
        "booking proxy request failed"
    );
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "message": message })),
    )
        .into_response()
}
