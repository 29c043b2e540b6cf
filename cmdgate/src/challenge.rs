//! Loopback HTTP challenge controller.
//!
//! A challenge session binds an OS-assigned port on `127.0.0.1`, serves a
//! single-purpose page, and resolves exactly once with the first of:
//! approve endpoint, deny endpoint, deadline, or caller cancellation.
//! Chosen over a terminal prompt because the caller is often an agent
//! without a TTY.

use std::{
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use rand::Rng;
use serde_derive::Serialize;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use cmdgate_core::{ChallengeKind, MatchRecord, Severity};

use crate::{
    error::{Error, Result},
    page,
};

/// Default deadline for a pending challenge.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// How long shutdown waits for open connections before destroying them.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Closed list of target words for the word challenge.
pub const WORDS: [&str; 10] = [
    "CAUTION", "DANGER", "SAFETY", "VERIFY", "CONFIRM", "PROCEED", "CAREFUL", "HAZARD", "SECURE",
    "REVIEW",
];

/// What the challenge page renders: the command under review and the rules
/// that fired on it.
#[derive(Debug, Clone)]
pub struct ChallengeData {
    pub command: String,
    pub matches: Vec<MatchRecord>,
    pub highest_severity: Severity,
}

#[derive(Debug, Clone)]
pub struct ChallengeOptions {
    pub timeout: Duration,
    /// Spawn the platform browser opener after binding. Suppressed in tests.
    pub open_browser: bool,
}

impl Default for ChallengeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            open_browser: true,
        }
    }
}

/// Final outcome of one challenge session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub approved: bool,
    pub reason: Option<String>,
}

impl Verdict {
    #[must_use]
    pub(crate) fn approved() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    #[must_use]
    pub(crate) fn denied(reason: &str) -> Self {
        Self {
            approved: false,
            reason: Some(reason.to_string()),
        }
    }

    /// A denial carrying no reason; the pipeline substitutes its default.
    #[must_use]
    const fn denied_silently() -> Self {
        Self {
            approved: false,
            reason: None,
        }
    }
}

/// Server-side state the page must verify against.
#[derive(Debug, Clone)]
pub enum ChallengeState {
    Confirm,
    Math { a: u32, b: u32, answer: u32 },
    Word { target: &'static str },
    Block,
}

impl ChallengeState {
    /// Draw the challenge material for `kind`.
    fn generate(kind: ChallengeKind) -> Self {
        let mut rng = rand::rng();
        match kind {
            ChallengeKind::Confirm => Self::Confirm,
            ChallengeKind::Math => {
                let a = rng.random_range(0..=10);
                let b = rng.random_range(0..=10);
                Self::Math { a, b, answer: a + b }
            }
            ChallengeKind::Word => Self::Word {
                target: WORDS[rng.random_range(0..WORDS.len())],
            },
            ChallengeKind::Block => Self::Block,
        }
    }
}

/// Single-resolve sink: the first call to [`ResolveSlot::resolve`] wins,
/// every later call is a no-op. Replaces the interval-polling mutable slot
/// with a one-shot channel, so a deadline can never fire after an endpoint
/// already resolved.
#[derive(Debug)]
pub(crate) struct ResolveSlot {
    tx: Mutex<Option<oneshot::Sender<Verdict>>>,
}

impl ResolveSlot {
    fn new() -> (Arc<Self>, oneshot::Receiver<Verdict>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    /// Returns `true` when this call performed the resolution.
    pub(crate) fn resolve(&self, verdict: Verdict) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(verdict).is_ok(),
            None => false,
        }
    }
}

/// Idempotent cancellation handle for a pending challenge.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    resolver: Arc<ResolveSlot>,
}

impl CancelHandle {
    /// Resolve the session with `approved=false, reason="cancelled"`.
    /// Harmless after the session already resolved.
    pub fn cancel(&self) {
        self.resolver.resolve(Verdict::denied("cancelled"));
    }
}

struct SessionState {
    data: ChallengeData,
    state: ChallengeState,
    resolver: Arc<ResolveSlot>,
}

type SharedState = Arc<SessionState>;

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
}

async fn page_handler(State(state): State<SharedState>) -> Html<String> {
    Html(page::render(&state.state, &state.data))
}

async fn approve_handler(State(state): State<SharedState>) -> impl IntoResponse {
    if matches!(state.state, ChallengeState::Block) {
        // A block session can never be approved, not even by hand-crafted
        // requests against the endpoint.
        state.resolver.resolve(Verdict::denied("blocked by policy"));
        return (StatusCode::FORBIDDEN, Json(StatusBody { status: "denied" }));
    }
    state.resolver.resolve(Verdict::approved());
    (StatusCode::OK, Json(StatusBody { status: "approved" }))
}

async fn deny_handler(State(state): State<SharedState>) -> impl IntoResponse {
    state.resolver.resolve(Verdict::denied_silently());
    (StatusCode::OK, Json(StatusBody { status: "denied" }))
}

async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Append `Connection: close` so no keep-alive connection outlives its
/// response and shutdown never hangs on an idle socket.
async fn close_connection(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

fn router(shared: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(page_handler))
        .route("/approve", any(approve_handler))
        .route("/deny", any(deny_handler))
        .route("/favicon.ico", get(favicon_handler))
        .fallback(not_found)
        .layer(cors)
        .layer(middleware::from_fn(close_connection))
        .with_state(shared)
}

/// Best-effort launch of the platform browser opener.
fn spawn_browser(port: u16) {
    let url = format!("http://127.0.0.1:{port}/");

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = std::process::Command::new("open");
        c.arg(&url);
        c
    };
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/c", "start", &url]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(&url);
        c
    };

    match command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => debug!(%url, "opened challenge page"),
        Err(err) => warn!(%err, %url, "could not open a browser; visit the URL manually"),
    }
}

/// An open challenge session: listener bound, page served, verdict pending.
pub struct PendingChallenge {
    port: u16,
    kind: ChallengeKind,
    timeout: Duration,
    resolver: Arc<ResolveSlot>,
    rx: oneshot::Receiver<Verdict>,
    server: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

impl PendingChallenge {
    /// Bind `127.0.0.1:0`, install routes and start serving.
    ///
    /// # Errors
    /// [`Error::ChallengeTransport`] when the listener cannot be bound.
    pub async fn open(
        kind: ChallengeKind,
        data: ChallengeData,
        options: &ChallengeOptions,
    ) -> Result<Self> {
        let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|err| Error::ChallengeTransport(err.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|err| Error::ChallengeTransport(err.to_string()))?
            .port();

        let state = ChallengeState::generate(kind);
        let (resolver, rx) = ResolveSlot::new();
        let shared = Arc::new(SessionState {
            data,
            state,
            resolver: Arc::clone(&resolver),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(shared);
        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                warn!(%err, "challenge server error");
            }
        });

        debug!(%port, %kind, "challenge session serving");
        if options.open_browser {
            spawn_browser(port);
        }

        Ok(Self {
            port,
            kind,
            timeout: options.timeout,
            resolver,
            rx,
            server,
            shutdown_tx,
        })
    }

    /// The OS-assigned port of this session.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    /// A handle that cancels this session from elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            resolver: Arc::clone(&self.resolver),
        }
    }

    /// Race the resolver against the deadline, then tear the server down:
    /// stop accepting, wait briefly for open connections, destroy the rest.
    /// The port is released before this returns.
    pub async fn wait(self) -> Verdict {
        let Self {
            port,
            resolver,
            rx,
            mut server,
            shutdown_tx,
            timeout,
            ..
        } = self;

        let verdict = tokio::select! {
            received = rx => received.unwrap_or_else(|_| Verdict::denied("challenge system error")),
            () = tokio::time::sleep(timeout) => {
                // Mark the slot resolved so late endpoint hits are ignored.
                resolver.resolve(Verdict::denied("timeout"));
                Verdict::denied("timeout")
            }
        };

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(TEARDOWN_GRACE, &mut server).await.is_err() {
            server.abort();
        }
        debug!(%port, approved = verdict.approved, "challenge session closed");

        verdict
    }
}

/// Open a session and await its verdict.
///
/// # Errors
/// [`Error::ChallengeTransport`] when the session cannot be opened.
pub async fn run(
    kind: ChallengeKind,
    data: ChallengeData,
    options: &ChallengeOptions,
) -> Result<Verdict> {
    let pending = PendingChallenge::open(kind, data, options).await?;
    Ok(pending.wait().await)
}
