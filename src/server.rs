use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose, Engine};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::handlers::{CustomerProcessor, CustomerView, FoodProcessor};
use crate::models::{NutritionResult, RecommendedValues, SessionState};

pub const SESSION_HEADER: &str = "x-session-id";

pub struct AppState {
    pub food_processor: Arc<FoodProcessor>,
    pub customer_processor: Arc<CustomerProcessor>,
    /// Active sessions keyed by `X-Session-Id`. Only resolved customers are stored.
    pub sessions: Mutex<HashMap<String, SessionState>>,
}

impl AppState {
    pub fn new(food_processor: Arc<FoodProcessor>, customer_processor: Arc<CustomerProcessor>) -> Self {
        Self {
            food_processor,
            customer_processor,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CustomerLookupRequest {
    #[serde(default)]
    pub customer_code: String,
    #[serde(default)]
    pub guardian_code: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerLookupResponse {
    pub photo_png_base64: Option<String>,
    pub message: String,
    pub chart_svg: Option<String>,
}

pub fn create_router(food_processor: Arc<FoodProcessor>, customer_processor: Arc<CustomerProcessor>) -> Router {
    let state = Arc::new(AppState::new(food_processor, customer_processor));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/customers/lookup", post(customer_lookup_handler))
        .route("/api/food", post(food_handler))
        .route("/api/recommended", get(recommended_handler))
        .route("/api/logout", post(logout_handler))
        .with_state(state)
}

/// `None` for a missing or blank header. Such requests get a throwaway session.
fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn load_session(state: &AppState, id: Option<&str>) -> SessionState {
    match id {
        Some(id) => state.sessions.lock().await.get(id).cloned().unwrap_or_default(),
        None => SessionState::new(),
    }
}

fn encode_png_base64(photo: &RgbImage) -> anyhow::Result<String> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(photo.clone()).write_to(&mut buf, ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(buf.into_inner()))
}

fn lookup_response(view: CustomerView) -> CustomerLookupResponse {
    let photo_png_base64 = view.photo.as_ref().and_then(|photo| {
        encode_png_base64(photo)
            .map_err(|e| log::error!("❌ Failed to encode customer photo: {:#}", e))
            .ok()
    });
    let chart_svg = view.chart.as_ref().and_then(|chart| {
        chart
            .render_svg()
            .map_err(|e| log::error!("❌ Failed to render nutrition chart: {:#}", e))
            .ok()
    });

    CustomerLookupResponse {
        photo_png_base64,
        message: view.message,
        chart_svg,
    }
}

async fn customer_lookup_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CustomerLookupRequest>,
) -> Json<CustomerLookupResponse> {
    // A fresh session becomes active only on success, so a failed lookup
    // leaves the stored entry (or its absence after a logout) untouched.
    let mut session = SessionState::new();

    let view = state
        .customer_processor
        .get_customer_info(&request.customer_code, &request.guardian_code, &mut session)
        .await;

    match session_id(&headers) {
        Some(id) if session.is_active() => {
            state.sessions.lock().await.insert(id, session);
        }
        Some(_) => {}
        None => log::debug!("Lookup without {} header; session not kept", SESSION_HEADER),
    }
    Json(lookup_response(view))
}

async fn food_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Json<NutritionResult> {
    let mut image_bytes = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => image_bytes = Some(bytes),
                    Err(e) => return Json(NutritionResult::failure(format!("Error: {}", e), 0.0)),
                }
            }
            Ok(None) => break,
            Err(e) => return Json(NutritionResult::failure(format!("Error: {}", e), 0.0)),
        }
    }

    let image = match image_bytes.filter(|b| !b.is_empty()) {
        None => None,
        Some(bytes) => match image::load_from_memory(&bytes) {
            Ok(img) => Some(img),
            Err(e) => {
                log::warn!("⚠️ Uploaded image could not be decoded: {}", e);
                return Json(NutritionResult::failure(format!("Error: {}", e), 0.0));
            }
        },
    };

    let session = load_session(&state, session_id(&headers).as_deref()).await;
    Json(state.food_processor.get_nutritional_info(image.as_ref(), &session).await)
}

async fn recommended_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Option<RecommendedValues>> {
    let session = load_session(&state, session_id(&headers).as_deref()).await;
    Json(state.food_processor.get_recommended_values(&session).await)
}

async fn logout_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    let Some(id) = session_id(&headers) else {
        return StatusCode::NO_CONTENT;
    };
    if let Some(mut session) = state.sessions.lock().await.remove(&id) {
        session.clear();
        log::info!("👋 Session {} closed", id);
    }
    StatusCode::NO_CONTENT
}

async fn health_check() -> &'static str {
    "OK"
}
