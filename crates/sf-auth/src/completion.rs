//! Authorization-result delivery
//!
//! The hosted UI runs in a separate browsing context; its result has to find
//! its way back to the initiating app. Two transports race to deliver it:
//!
//! 1. the loopback callback server, when the provider redirects straight to
//!    `http://127.0.0.1:{port}/callback`;
//! 2. the durable hand-off slot, written by whichever other process received
//!    the redirect when a direct loopback hop was not available.
//!
//! Both may fire for the same authorization result. Whichever delivers first
//! wins; the flow controller deduplicates through its one-shot redemption
//! flag, so the receiving side stays idempotent.

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde::Deserialize;
use sf_config::AuthConfig;
use sf_keystore::HandoffSlot;
use sf_types::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// An authorization result as delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    /// Single-use authorization code
    pub code: String,

    /// Anti-CSRF state echoed by the provider
    pub state: String,
}

/// One delivery path for the authorization result
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Direct future deliveries into `tx`
    ///
    /// Called once per sign-in attempt; a later call supersedes the previous
    /// subscription.
    async fn subscribe(&self, tx: mpsc::Sender<CompletionEvent>) -> AppResult<()>;
}

/// The logical completion channel: all transports feeding one receiver
pub struct CompletionChannel {
    transports: Vec<Arc<dyn CompletionTransport>>,
}

impl CompletionChannel {
    pub fn new(transports: Vec<Arc<dyn CompletionTransport>>) -> Self {
        Self { transports }
    }

    /// The standard transport pair: loopback callback server racing the
    /// hand-off slot observer at the default platform location
    pub fn standard(config: &AuthConfig) -> AppResult<Self> {
        Ok(Self::new(vec![
            Arc::new(CallbackServer::new(config.callback_port)),
            Arc::new(HandoffWatcher::new(HandoffSlot::default_location()?)),
        ]))
    }

    /// Open the channel for one sign-in attempt
    ///
    /// Dropping the receiver ends the attempt; transports notice the closed
    /// channel and stop delivering.
    pub async fn open(&self) -> AppResult<mpsc::Receiver<CompletionEvent>> {
        let (tx, rx) = mpsc::channel(8);
        for transport in &self.transports {
            transport.subscribe(tx.clone()).await?;
        }
        Ok(rx)
    }
}

/// Query parameters of the provider redirect
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type TxSlot = Arc<Mutex<Option<mpsc::Sender<CompletionEvent>>>>;

/// Loopback HTTP server receiving the provider redirect
///
/// The server binds lazily on the first subscription and then stays up; it is
/// lightweight and stateless between attempts. Redirects whose query string
/// lacks either `code` or `state` are answered with an error page and never
/// reach the flow controller.
pub struct CallbackServer {
    port: u16,
    current_tx: TxSlot,
    started: tokio::sync::Mutex<bool>,
}

impl CallbackServer {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            current_tx: Arc::new(Mutex::new(None)),
            started: tokio::sync::Mutex::new(false),
        }
    }

    async fn start_server(&self) -> AppResult<()> {
        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(Arc::clone(&self.current_tx));

        let addr = format!("127.0.0.1:{}", self.port);
        info!("Binding sign-in callback server to http://{}/callback", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AppError::OAuthFlow(format!(
                "Failed to bind callback server on port {}: {}",
                self.port, e
            ))
        })?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Sign-in callback server error: {}", e);
            }
        });

        Ok(())
    }
}

#[async_trait]
impl CompletionTransport for CallbackServer {
    async fn subscribe(&self, tx: mpsc::Sender<CompletionEvent>) -> AppResult<()> {
        *self.current_tx.lock() = Some(tx);

        let mut started = self.started.lock().await;
        if !*started {
            self.start_server().await?;
            *started = true;
        }
        Ok(())
    }
}

async fn handle_callback(
    State(tx_slot): State<TxSlot>,
    Query(params): Query<CallbackQuery>,
) -> impl IntoResponse {
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        error!("Provider declined authorization: {} - {}", error, description);

        return (
            StatusCode::BAD_REQUEST,
            page(
                "Sign-in failed",
                &format!("The sign-in was not completed ({}).", description),
            ),
        );
    }

    let (Some(code), Some(state)) = (params.code, params.state) else {
        warn!("Discarding callback without both code and state");
        return (
            StatusCode::BAD_REQUEST,
            page(
                "Incomplete response",
                "The sign-in response was missing required parameters.",
            ),
        );
    };

    let tx = tx_slot.lock().clone();
    match tx {
        Some(tx) => {
            if tx.send(CompletionEvent { code, state }).await.is_err() {
                debug!("No sign-in attempt is listening; callback dropped");
            }
        }
        None => debug!("Callback received outside any sign-in attempt"),
    }

    (
        StatusCode::OK,
        page(
            "Sign-in received",
            "You can close this window and return to Shopfront.",
        ),
    )
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<html>
    <head><title>{title}</title></head>
    <body style="font-family: sans-serif; text-align: center; padding: 50px;">
        <h1>{title}</h1>
        <p>{body}</p>
    </body>
</html>"#
    ))
}

/// Hand-off slot observer
///
/// Polls the durable slot that a second app instance writes when it receives
/// the provider redirect. The payload is consumed (and the slot deleted) the
/// moment it is observed; the observer loop ends when the attempt's receiver
/// is dropped.
pub struct HandoffWatcher {
    slot: HandoffSlot,
    poll_interval: Duration,
}

impl HandoffWatcher {
    pub fn new(slot: HandoffSlot) -> Self {
        Self {
            slot,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(slot: HandoffSlot, poll_interval: Duration) -> Self {
        Self {
            slot,
            poll_interval,
        }
    }
}

#[async_trait]
impl CompletionTransport for HandoffWatcher {
    async fn subscribe(&self, tx: mpsc::Sender<CompletionEvent>) -> AppResult<()> {
        let slot = self.slot.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            loop {
                if tx.is_closed() {
                    break;
                }

                match slot.take() {
                    Ok(Some(payload)) => {
                        debug!("Observed authorization result in hand-off slot");
                        let event = CompletionEvent {
                            code: payload.code,
                            state: payload.state,
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Hand-off slot read failed: {}", e),
                }

                tokio::time::sleep(poll_interval).await;
            }
        });

        Ok(())
    }
}
