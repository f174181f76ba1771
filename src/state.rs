//! Application state: the in-memory session store, the completion backend and the agent config.
//!
//! Each session sits behind its own async mutex. Handlers hold it for the whole action,
//! including the upstream round-trip, so actions on one session run one at a time.
//! Sessions nobody has touched for `session_idle` are swept out periodically.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{AgentConfig, Settings};
use crate::error::AppError;
use crate::llm::{ChatClient, CompletionBackend};
use crate::workflow::Session;

pub type SessionHandle = Arc<Mutex<Session>>;

pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(3600);
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub struct SessionSlot {
    handle: SessionHandle,
    touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, SessionSlot>>>,
    pub backend: Arc<dyn CompletionBackend>,
    pub agent: AgentConfig,
    pub session_idle: Duration,
}

impl AppState {
    /// Build state from settings: real chat client, prompts from config.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let client = ChatClient::new(&settings.llm)?;
        info!(target: "codecraft", base_url = %client.base_url, model = %client.model, "Completion client ready.");
        Ok(Self {
            session_idle: settings.session_idle,
            ..Self::with_backend(Arc::new(client), settings.agent.clone())
        })
    }

    pub fn with_backend(backend: Arc<dyn CompletionBackend>, agent: AgentConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            backend,
            agent,
            session_idle: DEFAULT_SESSION_IDLE,
        }
    }

    /// Start a fresh session at step 1.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> (String, SessionHandle) {
        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(Session::new()));
        let slot = SessionSlot { handle: handle.clone(), touched: Instant::now() };
        self.sessions.write().await.insert(id.clone(), slot);
        info!(target: "codecraft", session = %id, "Session created");
        (id, handle)
    }

    /// Look up a session and mark it as used.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn session(&self, id: &str) -> Result<SessionHandle, AppError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions.get_mut(id).ok_or_else(|| AppError::NotFound(id.to_string()))?;
        slot.touched = Instant::now();
        Ok(slot.handle.clone())
    }

    /// Drop a session and everything it holds.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: &str) -> Result<(), AppError> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!(target: "codecraft", session = %id, "Session removed");
                Ok(())
            }
            None => Err(AppError::NotFound(id.to_string())),
        }
    }

    /// Drop sessions idle for longer than `session_idle` as of `now`. A session with an
    /// action in flight is kept. Returns how many were dropped.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            now.saturating_duration_since(slot.touched) <= self.session_idle || slot.handle.try_lock().is_err()
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(target: "codecraft", evicted, remaining = sessions.len(), "Idle sessions dropped");
        }
        evicted
    }

    /// Run `evict_idle` on a timer. Disabled when `session_idle` is zero.
    pub fn spawn_idle_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.session_idle.is_zero() {
            debug!(target: "codecraft", "Idle session sweeping disabled");
            return None;
        }
        let period = self.session_idle.min(MAX_SWEEP_PERIOD);
        let state = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            loop {
                ticks.tick().await;
                state.evict_idle(Instant::now()).await;
            }
        }))
    }
}
