//! Authorization flow and data handlers
//!
//! Endpoints:
//! - GET  /authorize              start the flow, 302 to VitaDock
//! - GET  /callback               finish the flow, create a session
//! - GET  /thermodocks            active readings of the last 10 days
//! - POST /thermodocks/generate   ask VitaDock to generate readings

use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};
use uuid::Uuid;
use vitadock_api::Thermodock;
use vitadock_auth::{AccessCredential, CallbackParams, ClientState};

use crate::AppState;
use crate::error::{Error, auth_error_kind};
use crate::metrics;
use crate::session::{
    CLIENT_STATE_COOKIE, SESSION_COOKIE, clear_cookie, cookie_value, set_cookie,
};

/// Window and cap for the readings page.
pub const RECENT_DAYS: u64 = 10;
pub const RECENT_MAX: u32 = 50;

fn outcome<T>(result: &vitadock_auth::Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => auth_error_kind(e),
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value)
        .map_err(|e| vitadock_auth::Error::Encoding(format!("response header: {e}")).into())
}

fn found(location: &str, mut headers: HeaderMap) -> Result<Response, Error> {
    headers.insert(LOCATION, header_value(location)?);
    Ok((StatusCode::FOUND, headers).into_response())
}

fn json_response(body: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// GET /authorize
pub async fn authorize(State(state): State<AppState>) -> Result<Response, Error> {
    let started = Instant::now();
    let result = state.consumer.begin_authorization().await;
    metrics::record_authorization(
        "temporary_credential",
        outcome(&result),
        started.elapsed().as_secs_f64(),
    );
    let redirect = result?;

    let mut headers = HeaderMap::new();
    if let Some(client_state) = &redirect.client_state {
        let cookie = set_cookie(
            CLIENT_STATE_COOKIE,
            client_state.as_str(),
            Some(state.temporary_credential_ttl_secs),
        );
        headers.insert(SET_COOKIE, header_value(&cookie)?);
    }
    info!(token = %redirect.token, "redirecting user agent to VitaDock");
    found(redirect.url.as_str(), headers)
}

/// GET /callback
///
/// A callback without a usable token sends the user back to `/authorize`.
pub async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    request_headers: HeaderMap,
) -> Result<Response, Error> {
    let client_state = cookie_value(&request_headers, CLIENT_STATE_COOKIE).map(ClientState::new);
    let had_client_state = client_state.is_some();
    let params = CallbackParams::from_query(query.as_deref().unwrap_or(""))
        .with_client_state(client_state);

    let started = Instant::now();
    let result = state.consumer.complete_authorization(&params).await;
    let elapsed = started.elapsed().as_secs_f64();

    // The state cookie is single use whatever the outcome
    let mut headers = HeaderMap::new();
    if had_client_state {
        headers.append(SET_COOKIE, header_value(&clear_cookie(CLIENT_STATE_COOKIE))?);
    }

    let access = match result {
        Ok(access) => access,
        Err(e) => {
            metrics::record_authorization("access_credential", auth_error_kind(&e), elapsed);
            let mut response = Error::from(e).into_response();
            response.headers_mut().extend(headers);
            return Ok(response);
        }
    };

    match access {
        AccessCredential::Absent => {
            metrics::record_authorization("access_credential", "absent", elapsed);
            warn!("callback produced no access credential, restarting authorization");
            found("/authorize", headers)
        }
        authorized @ AccessCredential::Authorized { .. } => {
            metrics::record_authorization("access_credential", "success", elapsed);
            let token = authorized.identifier().unwrap_or_default().to_string();
            let session = state.sessions.create(authorized).await;
            info!(token = %token, %session, "session created");
            headers.append(
                SET_COOKIE,
                header_value(&set_cookie(
                    SESSION_COOKIE,
                    &session.to_string(),
                    Some(state.sessions.ttl().as_secs()),
                ))?,
            );
            found("/thermodocks", headers)
        }
    }
}

async fn session_credential(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AccessCredential, Error> {
    let id = cookie_value(headers, SESSION_COOKIE)
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(Error::MissingSession)?;
    state.sessions.get(&id).await.ok_or(Error::MissingSession)
}

/// GET /thermodocks
pub async fn thermodocks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let access = session_credential(&state, &headers).await?;

    let started = Instant::now();
    let result = state
        .api
        .fetch_last_days(&access, RECENT_DAYS, RECENT_MAX)
        .await;
    metrics::record_api_request(
        "fetch_recent",
        outcome(&result),
        started.elapsed().as_secs_f64(),
    );

    let readings: Vec<Thermodock> = result?.into_iter().filter(|r| r.active).collect();
    Ok(json_response(serde_json::json!({
        "count": readings.len(),
        "readings": readings,
    })))
}

/// POST /thermodocks/generate
///
/// An `application/x-www-form-urlencoded` request body is forwarded as the
/// signed form payload.
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, Error> {
    let access = session_credential(&state, &headers).await?;
    let payload: Vec<(String, String)> = url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let started = Instant::now();
    let result = state.api.submit(&access, &payload).await;
    metrics::record_api_request("submit", outcome(&result), started.elapsed().as_secs_f64());

    let id = result?;
    Ok(json_response(serde_json::json!({ "id": id })))
}
