//! Gateway HTTP server: router, handlers and listeners (plain + optional TLS).

use crate::channels::{LineChannel, LineWebhookPayload, ReplyChannel, LINE_SIGNATURE_HEADER};
use crate::config::{Settings, TlsSettings};
use crate::gateway::auth::require_call_key;
use crate::gateway::error::RelayError;
use crate::gateway::relay::relay_events;
use crate::llm::{CompletionBackend, OpenAiClient};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Fixed label in front of the reply text on `GET /call`.
pub const CALL_RESPONSE_PREFIX: &str = "Response send to client::";

/// Shared state for the gateway. Everything here is read-only after start-up; clients are built
/// once and reused by every request.
#[derive(Clone)]
pub struct GatewayState {
    /// Plain listener port (reported by the health route).
    pub port: u16,
    pub tls_enabled: bool,
    pub completion: Arc<dyn CompletionBackend>,
    /// Webhook capability. None when the LINE channel is not configured; POST /callback is then 404.
    pub channel: Option<Arc<dyn ReplyChannel>>,
    /// Bearer key for GET /call. None rejects every direct call.
    pub call_key: Option<String>,
}

impl GatewayState {
    /// Build the production state: OpenAI client, and the LINE channel when configured.
    pub fn from_settings(settings: &Settings) -> Self {
        let completion: Arc<dyn CompletionBackend> = Arc::new(OpenAiClient::new(&settings.completion));
        let channel = settings
            .line
            .as_ref()
            .map(|line| Arc::new(LineChannel::new(line)) as Arc<dyn ReplyChannel>);
        Self {
            port: settings.port,
            tls_enabled: settings.tls.is_some(),
            completion,
            channel,
            call_key: settings.call_key.clone(),
        }
    }
}

/// Routes: `GET /`, `GET /call` (bearer key), `POST /callback` (LINE webhook).
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route(
            "/call",
            get(call_handler)
                .route_layer(middleware::from_fn_with_state(state.clone(), require_call_key)),
        )
        .route("/callback", post(callback_handler))
        .with_state(state)
}

/// Run the gateway; binds `settings.bind:settings.port` and, when TLS material is configured,
/// `settings.bind:tls.port` as well. Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(settings: Settings) -> Result<()> {
    let state = GatewayState::from_settings(&settings);
    match &state.channel {
        Some(channel) => log::info!("{} channel configured; POST /callback enabled", channel.id()),
        None => log::info!("LINE channel token/secret not set; POST /callback disabled"),
    }
    if state.call_key.is_none() {
        log::warn!("HTTP_CALL_KEY not set; GET /call will reject every request");
    }
    log::info!(
        "completion model {} at {}",
        settings.completion.model,
        settings.completion.base_url
    );
    let app = router(state);

    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on port {} ({})", settings.port, bind_addr);

    let tls_handle = axum_server::Handle::new();
    let plain = axum::serve(listener, app.clone())
        .with_graceful_shutdown(shutdown_signal(tls_handle.clone()));

    match settings.tls {
        Some(ref tls) => {
            let rustls = load_tls_config(tls).await?;
            let tls_bind = format!("{}:{}", settings.bind, tls.port);
            let addr = tokio::net::lookup_host(&tls_bind)
                .await
                .with_context(|| format!("resolving {}", tls_bind))?
                .next()
                .with_context(|| format!("no address for {}", tls_bind))?;
            log::info!("TLS listening on port {} ({})", tls.port, addr);
            let secure = axum_server::bind_rustls(addr, rustls)
                .handle(tls_handle)
                .serve(app.into_make_service());
            tokio::try_join!(
                async move { plain.await.context("gateway server exited") },
                async move { secure.await.context("TLS server exited") },
            )?;
        }
        None => {
            log::info!("TLS key/certificate/CA not all set; TLS listener disabled");
            plain.await.context("gateway server exited")?;
        }
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Certificate followed by the CA bundle, newline-separated.
fn build_cert_chain(mut cert: Vec<u8>, ca: &[u8]) -> Vec<u8> {
    if !cert.is_empty() && !cert.ends_with(b"\n") {
        cert.push(b'\n');
    }
    cert.extend_from_slice(ca);
    cert
}

async fn load_tls_config(tls: &TlsSettings) -> Result<RustlsConfig> {
    let cert = tokio::fs::read(&tls.cert_path)
        .await
        .with_context(|| format!("reading TLS certificate {}", tls.cert_path.display()))?;
    let ca = tokio::fs::read(&tls.ca_path)
        .await
        .with_context(|| format!("reading TLS CA {}", tls.ca_path.display()))?;
    let key = tokio::fs::read(&tls.key_path)
        .await
        .with_context(|| format!("reading TLS key {}", tls.key_path.display()))?;
    RustlsConfig::from_pem(build_cert_chain(cert, &ca), key)
        .await
        .context("loading TLS certificate and key")
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Also starts graceful shutdown of the TLS listener, if one is running.
async fn shutdown_signal(tls_handle: axum_server::Handle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
    tls_handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

#[derive(Debug, Deserialize)]
struct CallParams {
    message: Option<String>,
}

/// GET /call?message=...: one completion, returned as plain text behind a fixed label.
async fn call_handler(
    State(state): State<GatewayState>,
    Query(params): Query<CallParams>,
) -> Result<String, RelayError> {
    let message = params
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| RelayError::BadRequest("message query parameter is required".to_string()))?;
    let reply = state.completion.complete(&message).await?;
    Ok(format!("{}{}", CALL_RESPONSE_PREFIX, reply))
}

/// POST /callback: LINE webhook. Verifies X-Line-Signature, relays every text event, and answers
/// with the per-event results (500 when any event failed).
async fn callback_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<serde_json::Value>>, RelayError> {
    let Some(channel) = state.channel.as_deref() else {
        return Err(RelayError::NotFound);
    };
    let signature = headers
        .get(LINE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(RelayError::BadSignature)?;
    if !channel.verify_signature(&body, signature) {
        log::warn!("{}: webhook signature validation failed", channel.id());
        return Err(RelayError::BadSignature);
    }
    let payload: LineWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| RelayError::BadRequest(format!("invalid webhook body: {}", e)))?;
    let events = payload.into_inbound_events();
    log::info!("{}: webhook delivery with {} event(s)", channel.id(), events.len());

    let results = relay_events(&events, state.completion.as_ref(), channel).await?;
    Ok(Json(results))
}

/// GET / returns a simple health JSON for liveness checks.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
        "webhook": state.channel.is_some(),
        "tls": state.tls_enabled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_chain_appends_ca_on_new_line() {
        let chain = build_cert_chain(b"-----CERT-----".to_vec(), b"-----CA-----\n");
        assert_eq!(chain, b"-----CERT-----\n-----CA-----\n".to_vec());

        let chain = build_cert_chain(b"-----CERT-----\n".to_vec(), b"-----CA-----\n");
        assert_eq!(chain, b"-----CERT-----\n-----CA-----\n".to_vec());
    }

    #[tokio::test]
    async fn missing_tls_files_are_reported() {
        let tls = TlsSettings {
            port: 3443,
            key_path: "/nonexistent/key.pem".into(),
            cert_path: "/nonexistent/cert.pem".into(),
            ca_path: "/nonexistent/ca.pem".into(),
        };
        let err = load_tls_config(&tls).await.unwrap_err();
        assert!(err.to_string().contains("reading TLS certificate"));
    }
}
