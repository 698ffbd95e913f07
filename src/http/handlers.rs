//! Route handlers.
//!
//! Every handler answers with the JSON envelope
//! `{"message", "status", "data"}`; failures go through
//! [`ServiceError`]'s `IntoResponse`. Service calls touch SQLite, so they
//! run on the blocking pool.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::middleware::AuthUser;
use super::AppState;
use crate::error::ServiceError;
use crate::models::{LoginRequest, NewUser, TestSample};

pub const REFRESH_COOKIE: &str = "refresh_token";

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub status: u16,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn ok<T: Serialize>(message: &str, data: T) -> Response {
    envelope(message, data, None).into_response()
}

fn envelope<T: Serialize>(message: &str, data: T, access_token: Option<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        message: message.to_string(),
        status: StatusCode::OK.as_u16(),
        data,
        access_token,
    })
}

async fn blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Internal(format!("blocking task failed: {}", e)))?
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ServiceError::Validation(e.body_text()))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": 200,
        "message": "Health is Good",
    }))
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let new_user = body(payload)?;
    let users = state.users.clone();
    blocking(move || users.register(&new_user)).await?;

    Ok(ok("user registered successfully", ()))
}

pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let request = body(payload)?;
    let users = state.users.clone();
    let tokens = blocking(move || users.login(&request)).await?;

    let cookie = refresh_cookie(&tokens.refresh_token, &state)?;
    let mut response = envelope("user login successfully", (), Some(tokens.access_token)).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ServiceError::Unauthorized("refresh token not present".to_string()))?;

    let users = state.users.clone();
    let tokens = blocking(move || users.refresh(&token)).await?;

    let cookie = refresh_cookie(&tokens.refresh_token, &state)?;
    let mut response = envelope(
        "refresh token generated successfully",
        (),
        Some(tokens.access_token),
    )
    .into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn submit_test(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<TestSample>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let sample = body(payload)?;
    debug!("Test submitted by {}: {:?}", caller.email, sample);

    let typing = state.typing.clone();
    let stats = blocking(move || typing.submit(&caller.email, &sample)).await?;

    Ok(ok("typing test recorded successfully", stats))
}

pub async fn user_data(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Response, ServiceError> {
    let users = state.users.clone();
    let user = blocking(move || users.user_by_email(&caller.email)).await?;

    Ok(ok("user data fetched successfully", user))
}

pub async fn top_performers(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let users = state.users.clone();
    let top = blocking(move || users.top_performers()).await?;

    Ok(ok("top performer fetched successfully", top))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let users = state.users.clone();
    let data = blocking(move || users.dashboard()).await?;

    Ok(ok("user data fetched successfully", data))
}

pub async fn typing_word(State(state): State<AppState>) -> Response {
    ok("typing word generated successfully", state.typing.typing_sentence())
}

#[derive(Debug, Deserialize)]
pub struct RecentTestQuery {
    pub month: Option<String>,
}

pub async fn recent_tests(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(query): Query<RecentTestQuery>,
) -> Result<Response, ServiceError> {
    let typing = state.typing.clone();
    let tests =
        blocking(move || typing.recent_tests(&caller.email, query.month.as_deref())).await?;

    Ok(ok("recent test fetched successfully", tests))
}

fn refresh_cookie(token: &str, state: &AppState) -> Result<HeaderValue, ServiceError> {
    let max_age = state.users.signer().refresh_ttl().num_seconds();
    HeaderValue::from_str(&refresh_cookie_text(token, max_age, state.secure_cookies))
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

/// `Set-Cookie` value for the refresh token.
///
/// Cross-site frontends only get the cookie back with `SameSite=None`,
/// which browsers accept only together with `Secure`.
fn refresh_cookie_text(token: &str, max_age: i64, secure: bool) -> String {
    let site = if secure { "SameSite=None; Secure" } else { "SameSite=Lax" };
    format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; {}",
        REFRESH_COOKIE, token, max_age, site
    )
}

/// Value of cookie `name` from the request's `Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
