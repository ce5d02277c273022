//! HTTP routes for the connection flow and settings surface
//!
//! The OAuth routes are the two local endpoints the provider round-trip
//! touches (callback, disconnect) plus the authorize-url hook the
//! settings screen calls. The settings routes expose field descriptors,
//! connection status, and credential submission as JSON — rendering is
//! the host's job.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tracing::{info, warn};

use common::Secret;
use zoom_auth::credentials::Credentials;
use zoom_auth::fields::settings_fields;

use crate::error::{ApiError, short_reason};
use crate::metrics::{record_authorize, record_refresh};

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<zoom_connector::Connector>,
    pub settings_url: String,
    pub site_base: String,
    pub option_prefix: String,
    pub prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/oauth/authorize-url", get(authorize_url))
        .route("/oauth/callback", get(oauth_callback))
        .route("/oauth/disconnect", get(oauth_disconnect))
        .route("/oauth/refresh", post(oauth_refresh))
        .route("/settings/fields", get(list_fields))
        .route("/settings/status", get(connection_status))
        .route("/settings/credentials", post(save_credentials))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// GET /oauth/authorize-url — start an authorization attempt.
///
/// Returns the provider URL the settings screen should send the
/// administrator to. Each call generates a fresh `state` nonce.
async fn authorize_url(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let url = state.connector.begin_authorization()?;
    Ok(Json(serde_json::json!({ "authorization_url": url })))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: String,
    state: String,
}

/// GET /oauth/callback — the provider redirect after user consent.
///
/// Exchanges the code and bounces back to the settings screen with a
/// success flag, or a short taxonomy reason on failure. The raw error
/// stays in the server log.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    match state.connector.authorize(&params.code, &params.state).await {
        Ok(()) => {
            record_authorize("ok");
            info!("provider connection established via callback");
            Redirect::to(&append_query(&state.settings_url, "zoom_connected=1"))
        }
        Err(e) => {
            let reason = short_reason(&e);
            record_authorize(reason);
            warn!(error = %e, "authorization callback failed");
            Redirect::to(&append_query(
                &state.settings_url,
                &format!("zoom_connected=0&reason={reason}"),
            ))
        }
    }
}

#[derive(Deserialize)]
struct DisconnectParams {
    return_to: Option<String>,
}

/// GET /oauth/disconnect — drop the connection, then bounce back.
///
/// The revoke is local-only; the provider is not called. `return_to`
/// must be site-local or it is replaced with the settings URL.
async fn oauth_disconnect(
    State(state): State<AppState>,
    Query(params): Query<DisconnectParams>,
) -> Result<Redirect, ApiError> {
    state.connector.disconnect()?;
    let target = sanitize_return_to(
        params.return_to.as_deref(),
        &state.site_base,
        &state.settings_url,
    );
    Ok(Redirect::to(&target))
}

/// POST /oauth/refresh — refresh the access token if it is near expiry.
///
/// Used by the host ahead of provider API calls; idempotent and
/// single-flight inside the connector.
async fn oauth_refresh(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    match state.connector.ensure_fresh().await {
        Ok(()) => {
            record_refresh("ok");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            record_refresh(short_reason(&e));
            Err(e.into())
        }
    }
}

/// GET /settings/fields — credential field descriptors for rendering.
async fn list_fields(State(state): State<AppState>) -> impl IntoResponse {
    Json(settings_fields(&state.option_prefix))
}

/// GET /settings/status — derived connection state plus the indicator
/// and label the settings screen shows.
async fn connection_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = state.connector.store().credentials()?;
    let connection = state.connector.status();
    Ok(Json(serde_json::json!({
        "state": connection.to_string(),
        "indicator": connection.indicator(),
        "text": connection.label(),
        "ready": credentials.has_required_fields(),
    })))
}

#[derive(Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    app_id: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: Secret<String>,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    api_key: Secret<String>,
}

/// POST /settings/credentials — persist submitted app credentials.
async fn save_credentials(
    State(state): State<AppState>,
    Json(form): Json<CredentialsForm>,
) -> Result<StatusCode, ApiError> {
    let credentials = Credentials {
        app_id: form.app_id,
        client_id: form.client_id,
        client_secret: form.client_secret,
        user_id: form.user_id,
        api_key: form.api_key,
    };
    state.connector.store().save_credentials(&credentials)?;
    info!("app credentials updated");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health — liveness plus the derived connection state.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connection": state.connector.status().to_string(),
    }))
}

/// GET /metrics — Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.prometheus.render()
}

/// Append a query fragment to a URL that may already carry one.
fn append_query(url: &str, query: &str) -> String {
    if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}

/// Only site-local targets are followed after a disconnect; anything
/// else falls back to the settings screen (open-redirect guard).
fn sanitize_return_to(requested: Option<&str>, site_base: &str, settings_url: &str) -> String {
    match requested {
        Some(url) if url.starts_with(site_base) => url.to_string(),
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => settings_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use axum::http::header::LOCATION;
    use axum::response::Response;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use zoom_auth::credentials::{CredentialStore, MemoryOptionStore, TokenSet, now_millis};
    use zoom_auth::token::TokenClient;
    use zoom_auth::url::UrlBuilder;
    use zoom_connector::{Connector, DEFAULT_REFRESH_MARGIN};

    use super::*;

    const SITE: &str = "https://events.example.com";
    const SETTINGS: &str = "https://events.example.com/wp-admin/settings?tab=apis";

    /// App state over an in-memory store, credentials not yet entered.
    fn bare_app_state(token_endpoint: &str) -> AppState {
        let store = CredentialStore::new(Arc::new(MemoryOptionStore::default()), "tribe_zooom_");
        let connector = Connector::new(
            store,
            TokenClient::new(token_endpoint.to_string()).unwrap(),
            UrlBuilder::new("https://zoom.us/oauth/authorize", SITE),
            format!("{SITE}/oauth/callback"),
            DEFAULT_REFRESH_MARGIN,
        );
        AppState {
            connector: Arc::new(connector),
            settings_url: SETTINGS.to_string(),
            site_base: SITE.to_string(),
            option_prefix: "tribe_zooom_".to_string(),
            prometheus: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    /// App state with complete credentials saved.
    fn app_state(token_endpoint: &str) -> AppState {
        let state = bare_app_state(token_endpoint);
        state
            .connector
            .store()
            .save_credentials(&Credentials {
                app_id: "app-1".into(),
                client_id: "abc".into(),
                client_secret: Secret::new("xyz".into()),
                user_id: "user-1".into(),
                api_key: Secret::new("key-1".into()),
            })
            .unwrap();
        state
    }

    /// An endpoint that refuses connections (port 9, discard).
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:9/oauth/token";

    fn fresh_tokens() -> TokenSet {
        TokenSet {
            access_token: "A1".into(),
            refresh_token: "R1".into(),
            expires_at: now_millis() + 3_600_000,
        }
    }

    fn location(response: Response) -> String {
        response
            .headers()
            .get(LOCATION)
            .expect("redirect must carry a location header")
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Pull the `state` value out of an authorization URL.
    fn state_from(url: &str) -> String {
        url.split("state=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn callback_success_redirects_with_success_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "A1",
                "refresh_token": "R1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = app_state(&format!("{}/oauth/token", server.uri()));
        let nonce = state_from(&state.connector.begin_authorization().unwrap());

        let redirect = oauth_callback(
            State(state.clone()),
            Query(CallbackParams {
                code: "code123".into(),
                state: nonce,
            }),
        )
        .await;

        // The settings URL already carries a query string, so the flag
        // is appended with `&`
        assert_eq!(
            location(redirect.into_response()),
            format!("{SETTINGS}&zoom_connected=1")
        );
        assert!(state.connector.is_authorized());
    }

    #[tokio::test]
    async fn callback_failure_redirects_with_short_reason() {
        let state = app_state(DEAD_ENDPOINT);
        let _url = state.connector.begin_authorization().unwrap();

        let redirect = oauth_callback(
            State(state.clone()),
            Query(CallbackParams {
                code: "code123".into(),
                state: "forged-state".into(),
            }),
        )
        .await;

        assert_eq!(
            location(redirect.into_response()),
            format!("{SETTINGS}&zoom_connected=0&reason=not_connected")
        );
        assert!(state.connector.store().tokens().unwrap().is_none());
    }

    #[tokio::test]
    async fn disconnect_rejects_foreign_return_to_and_clears_tokens() {
        let state = app_state(DEAD_ENDPOINT);
        state.connector.store().save_tokens(&fresh_tokens()).unwrap();

        let redirect = oauth_disconnect(
            State(state.clone()),
            Query(DisconnectParams {
                return_to: Some("https://evil.example.net/".into()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(location(redirect.into_response()), SETTINGS);

        let (creds, tokens) = state.connector.store().get().unwrap();
        assert!(tokens.is_none());
        assert_eq!(creds.client_id, "abc");
    }

    #[tokio::test]
    async fn disconnect_follows_site_local_return_to() {
        let state = app_state(DEAD_ENDPOINT);

        let redirect = oauth_disconnect(
            State(state),
            Query(DisconnectParams {
                return_to: Some(format!("{SITE}/events")),
            }),
        )
        .await
        .unwrap();

        assert_eq!(location(redirect.into_response()), format!("{SITE}/events"));
    }

    #[tokio::test]
    async fn status_reports_connected_payload() {
        let state = app_state(DEAD_ENDPOINT);
        state.connector.store().save_tokens(&fresh_tokens()).unwrap();

        let response = connection_status(State(state)).await.unwrap().into_response();
        let json = json_body(response).await;

        assert_eq!(json["state"], "connected");
        assert_eq!(json["indicator"], "good");
        assert_eq!(json["text"], "Connected!");
        assert_eq!(json["ready"], true);
    }

    #[tokio::test]
    async fn status_reports_not_connected_before_setup() {
        let state = bare_app_state(DEAD_ENDPOINT);

        let response = connection_status(State(state)).await.unwrap().into_response();
        let json = json_body(response).await;

        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["indicator"], "warning");
        assert_eq!(json["text"], "Not connected.");
        assert_eq!(json["ready"], false);
    }

    #[tokio::test]
    async fn save_credentials_persists_through_store() {
        let state = bare_app_state(DEAD_ENDPOINT);

        let status = save_credentials(
            State(state.clone()),
            Json(CredentialsForm {
                app_id: "app-1".into(),
                client_id: "abc".into(),
                client_secret: Secret::new("xyz".into()),
                user_id: "user-1".into(),
                api_key: Secret::new("key-1".into()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::NO_CONTENT);
        let creds = state.connector.store().credentials().unwrap();
        assert_eq!(creds.client_id, "abc");
        assert_eq!(creds.client_secret.expose(), "xyz");
        assert!(creds.has_required_fields());
    }

    #[tokio::test]
    async fn authorize_url_handler_returns_provider_url_with_state() {
        let state = app_state(DEAD_ENDPOINT);

        let response = authorize_url(State(state)).await.unwrap().into_response();
        let json = json_body(response).await;
        let url = json["authorization_url"].as_str().unwrap();

        assert!(url.starts_with("https://zoom.us/oauth/authorize?"), "got: {url}");
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("state="));
    }

    #[tokio::test]
    async fn authorize_url_without_credentials_is_rejected() {
        let state = bare_app_state(DEAD_ENDPOINT);

        let response = authorize_url(State(state)).await;
        let response = match response {
            Ok(_) => panic!("incomplete credentials must be rejected"),
            Err(api_error) => api_error.into_response(),
        };
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["type"], "not_connected");
    }

    #[tokio::test]
    async fn fields_endpoint_lists_prefixed_descriptors() {
        let state = app_state(DEAD_ENDPOINT);

        let response = list_fields(State(state)).await.into_response();
        let json = json_body(response).await;

        let fields = json.as_array().unwrap();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0]["key"], "tribe_zooom_app_id");
        assert_eq!(fields[0]["type"], "text");
    }

    #[test]
    fn append_query_handles_existing_query_string() {
        assert_eq!(
            append_query("https://site/settings", "zoom_connected=1"),
            "https://site/settings?zoom_connected=1"
        );
        assert_eq!(
            append_query("https://site/settings?tab=apis", "zoom_connected=1"),
            "https://site/settings?tab=apis&zoom_connected=1"
        );
    }

    #[test]
    fn return_to_accepts_site_local_targets() {
        assert_eq!(
            sanitize_return_to(Some("https://events.example.com/events"), SITE, SETTINGS),
            "https://events.example.com/events"
        );
        assert_eq!(
            sanitize_return_to(Some("/wp-admin/settings"), SITE, SETTINGS),
            "/wp-admin/settings"
        );
    }

    #[test]
    fn return_to_rejects_foreign_and_protocol_relative_targets() {
        assert_eq!(
            sanitize_return_to(Some("https://evil.example.net/"), SITE, SETTINGS),
            SETTINGS
        );
        assert_eq!(
            sanitize_return_to(Some("//evil.example.net/"), SITE, SETTINGS),
            SETTINGS
        );
        assert_eq!(sanitize_return_to(None, SITE, SETTINGS), SETTINGS);
    }
}
