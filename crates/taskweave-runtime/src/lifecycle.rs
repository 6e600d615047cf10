//! Lifecycle & Shutdown: the ordered, idempotent teardown sequence a
//! process runs once to drain in-flight requests and release its
//! external resources.
//!
//! The coordinator itself knows nothing about servers, heartbeats, or
//! service registries — those are boundary collaborators the process entry
//! point wires in as hooks, so this module stays transport-agnostic the
//! same way the kernel's traits keep the planner agnostic of the registry's
//! backing store.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// An async teardown step. Boxed because each hook closure captures
/// different state (a server handle, an HTTP client pool, ...) and the
/// coordinator holds them all behind one uniform type.
pub type ShutdownHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

const DEFAULT_SERVER_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_TOTAL_CAP: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    /// The total cap elapsed before every step finished; teardown stopped
    /// at whatever step was in flight.
    TimedOut,
    /// A concurrent or later call observed shutdown already underway and
    /// ran none of the steps itself.
    AlreadyInProgress,
}

/// Drives the 8-step ordered teardown, exactly once, within a total cap.
#[derive(Default)]
pub struct ShutdownCoordinator {
    is_shutting_down: AtomicBool,
    heartbeat_stop: Option<ShutdownHook>,
    refuse_new_requests: Option<ShutdownHook>,
    server_stop: Option<ShutdownHook>,
    close_orchestrator: Option<ShutdownHook>,
    deregister_service: Option<ShutdownHook>,
    close_http_clients: Option<ShutdownHook>,
    cancel_background_scope: Option<ShutdownHook>,
    server_grace: Option<Duration>,
    total_cap: Option<Duration>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heartbeat_stop(mut self, hook: ShutdownHook) -> Self {
        self.heartbeat_stop = Some(hook);
        self
    }

    pub fn with_refuse_new_requests(mut self, hook: ShutdownHook) -> Self {
        self.refuse_new_requests = Some(hook);
        self
    }

    pub fn with_server_stop(mut self, hook: ShutdownHook) -> Self {
        self.server_stop = Some(hook);
        self
    }

    pub fn with_close_orchestrator(mut self, hook: ShutdownHook) -> Self {
        self.close_orchestrator = Some(hook);
        self
    }

    pub fn with_deregister_service(mut self, hook: ShutdownHook) -> Self {
        self.deregister_service = Some(hook);
        self
    }

    pub fn with_close_http_clients(mut self, hook: ShutdownHook) -> Self {
        self.close_http_clients = Some(hook);
        self
    }

    pub fn with_cancel_background_scope(mut self, hook: ShutdownHook) -> Self {
        self.cancel_background_scope = Some(hook);
        self
    }

    pub fn with_server_grace(mut self, grace: Duration) -> Self {
        self.server_grace = Some(grace);
        self
    }

    pub fn with_total_cap(mut self, cap: Duration) -> Self {
        self.total_cap = Some(cap);
        self
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    /// Run the ordered teardown. Idempotent: a second call (concurrent or
    /// subsequent) observes `is_shutting_down` already set and returns
    /// immediately without re-running any step.
    pub async fn shutdown(&self, reason: &str) -> ShutdownOutcome {
        if self.is_shutting_down.swap(true, Ordering::SeqCst) {
            tracing::info!(reason, "shutdown already in progress, ignoring duplicate request");
            return ShutdownOutcome::AlreadyInProgress;
        }
        tracing::info!(reason, "shutdown: signalled");

        let cap = self.total_cap.unwrap_or(DEFAULT_TOTAL_CAP);
        match tokio::time::timeout(cap, self.run_steps()).await {
            Ok(()) => {
                tracing::info!("shutdown: complete");
                ShutdownOutcome::Completed
            }
            Err(_) => {
                tracing::error!(cap_secs = cap.as_secs(), "shutdown: exceeded total cap, abandoning remaining steps");
                ShutdownOutcome::TimedOut
            }
        }
    }

    async fn run_steps(&self) {
        tracing::info!("shutdown: stopping heartbeat");
        run_hook(&self.heartbeat_stop).await;

        tracing::info!("shutdown: refusing new requests at the boundary");
        run_hook(&self.refuse_new_requests).await;

        tracing::info!("shutdown: stopping external server");
        if let Some(hook) = &self.server_stop {
            let grace = self.server_grace.unwrap_or(DEFAULT_SERVER_GRACE);
            if tokio::time::timeout(grace, hook()).await.is_err() {
                tracing::warn!(grace_secs = grace.as_secs(), "shutdown: server stop exceeded its grace window, continuing teardown");
            }
        }

        tracing::info!("shutdown: closing orchestrator (releasing pooled LLM clients)");
        run_hook(&self.close_orchestrator).await;

        tracing::info!("shutdown: unregistering from the external service registry");
        run_hook(&self.deregister_service).await;

        tracing::info!("shutdown: closing external HTTP clients");
        run_hook(&self.close_http_clients).await;

        tracing::info!("shutdown: cancelling the background scope");
        run_hook(&self.cancel_background_scope).await;
    }
}

async fn run_hook(hook: &Option<ShutdownHook>) {
    if let Some(hook) = hook {
        hook().await;
    }
}
