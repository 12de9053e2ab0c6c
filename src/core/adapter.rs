//! The chat adapter: connectivity lifecycle plus reply streaming.
//!
//! Construction starts an initialization cycle that loads the backend module
//! and builds a client from the current preferences. Changing the model
//! starts a fresh cycle. Cycles are numbered, and only the newest one may
//! publish its outcome, so a slow stale cycle never overwrites a newer status.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::demo::DemoPacing;
use super::fragments::FragmentStream;
use super::message::Message;
use super::preferences::{Preferences, Settings};
use super::reply::{backend_reply, offline_reply};
use super::status::ConnectivityStatus;
use crate::api::ClientOptions;
use crate::backend::{BackendLoader, Connection};

/// How long a backend load may take before the cycle gives up on it.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    pub pacing: DemoPacing,
    pub load_timeout: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            pacing: DemoPacing::default(),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct Session {
    generation: u64,
    connection: Option<Connection>,
    sdk_version: Option<String>,
}

struct Inner {
    settings: Settings,
    loader: Arc<dyn BackendLoader>,
    options: AdapterOptions,
    status: watch::Sender<ConnectivityStatus>,
    session: Mutex<Session>,
    init_task: Mutex<Option<JoinHandle<()>>>,
}

/// Outcome of one initialization cycle before it is published.
struct CycleOutcome {
    /// `Some` when the module loaded; carries the module's version.
    loaded_version: Option<Option<String>>,
    connection: Option<Connection>,
}

#[derive(Clone)]
pub struct ChatAdapter {
    inner: Arc<Inner>,
}

impl ChatAdapter {
    /// Creates the adapter and starts the first initialization cycle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(settings: Settings, loader: Arc<dyn BackendLoader>) -> Self {
        Self::with_options(settings, loader, AdapterOptions::default())
    }

    pub fn with_pacing(
        settings: Settings,
        loader: Arc<dyn BackendLoader>,
        pacing: DemoPacing,
    ) -> Self {
        let options = AdapterOptions {
            pacing,
            ..AdapterOptions::default()
        };
        Self::with_options(settings, loader, options)
    }

    pub fn with_options(
        settings: Settings,
        loader: Arc<dyn BackendLoader>,
        options: AdapterOptions,
    ) -> Self {
        let (status, _) = watch::channel(ConnectivityStatus::Loading);
        let adapter = Self {
            inner: Arc::new(Inner {
                settings,
                loader,
                options,
                status,
                session: Mutex::new(Session::default()),
                init_task: Mutex::new(None),
            }),
        };
        adapter.reload();
        adapter
    }

    pub fn status(&self) -> ConnectivityStatus {
        *self.inner.status.borrow()
    }

    /// Receiver that observes every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectivityStatus> {
        self.inner.status.subscribe()
    }

    /// Waits until the current cycle has published `Ready` or `Fallback`.
    pub async fn wait_until_settled(&self) -> ConnectivityStatus {
        let mut receiver = self.subscribe_status();
        let settled = match receiver.wait_for(|status| status.is_settled()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        settled
    }

    pub fn model(&self) -> String {
        self.inner.settings.model()
    }

    /// Persists the model and, when it differs from the current one, restarts
    /// initialization.
    pub fn set_model(&self, model: &str) {
        let changed = self.inner.settings.model() != model;
        self.inner.settings.set_model(model);
        if changed {
            info!(model = %model, "Model changed; reinitializing backend");
            self.reload();
        }
    }

    pub fn has_credential(&self) -> bool {
        self.inner.settings.has_credential()
    }

    /// Persists the credential. It is picked up by the next initialization
    /// cycle.
    pub fn set_credential(&self, credential: Option<&str>) {
        self.inner.settings.set_credential(credential);
    }

    pub fn sdk_version(&self) -> Option<String> {
        self.lock_session().sdk_version.clone()
    }

    /// Starts a fresh initialization cycle in the background, abandoning any
    /// cycle still in flight. The status is `Loading` when this returns.
    pub fn reload(&self) {
        let generation = self.begin_cycle();
        let adapter = self.clone();
        let task = tokio::spawn(async move {
            adapter.run_cycle(generation).await;
        });

        let mut slot = self
            .inner
            .init_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Runs one initialization cycle to completion and returns the resulting
    /// status. When a newer cycle has started meanwhile, that cycle's status
    /// stands and this one's outcome is discarded.
    pub async fn initialize(&self) -> ConnectivityStatus {
        let generation = self.begin_cycle();
        self.run_cycle(generation).await
    }

    /// Streams the reply to `conversation`. Only a `Ready` adapter contacts
    /// the backend; otherwise the demo reply is produced.
    pub fn send(&self, conversation: &[Message]) -> FragmentStream {
        let connection = match self.status() {
            ConnectivityStatus::Ready => self.lock_session().connection.clone(),
            _ => None,
        };
        let pacing = self.inner.options.pacing;

        match connection {
            Some(connection) => {
                let model = self.inner.settings.model();
                debug!(model = %model, messages = conversation.len(), "Sending to backend");
                FragmentStream::new(backend_reply(
                    connection,
                    model,
                    conversation.to_vec(),
                    pacing,
                ))
            }
            None => {
                debug!(status = %self.status(), "Backend not ready; sending demo reply");
                FragmentStream::new(offline_reply(conversation, pacing))
            }
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn begin_cycle(&self) -> u64 {
        let mut session = self.lock_session();
        session.generation += 1;
        session.connection = None;
        self.inner.status.send_replace(ConnectivityStatus::Loading);
        session.generation
    }

    async fn run_cycle(&self, generation: u64) -> ConnectivityStatus {
        let preferences = self.inner.settings.preferences();
        let outcome = establish(
            self.inner.loader.as_ref(),
            preferences,
            self.inner.options.load_timeout,
        )
        .await;
        self.publish(generation, outcome)
    }

    fn publish(&self, generation: u64, outcome: CycleOutcome) -> ConnectivityStatus {
        let mut session = self.lock_session();
        if session.generation != generation {
            debug!(
                generation,
                current = session.generation,
                "Discarding stale initialization result"
            );
            return self.status();
        }

        if let Some(version) = outcome.loaded_version {
            session.sdk_version = version;
        }
        let status = if outcome.connection.is_some() {
            ConnectivityStatus::Ready
        } else {
            ConnectivityStatus::Fallback
        };
        session.connection = outcome.connection;
        self.inner.status.send_replace(status);
        info!(status = %status, generation, "Backend initialization finished");
        status
    }
}

async fn establish(
    loader: &dyn BackendLoader,
    preferences: Preferences,
    load_timeout: Duration,
) -> CycleOutcome {
    let failed = CycleOutcome {
        loaded_version: None,
        connection: None,
    };
    let handle = match tokio::time::timeout(load_timeout, loader.load()).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(err)) => {
            warn!(error = %err, "Backend failed to load; using demo mode");
            return failed;
        }
        Err(_) => {
            warn!(timeout = ?load_timeout, "Backend load timed out; using demo mode");
            return failed;
        }
    };

    let options = ClientOptions {
        token: preferences.credential,
        model: Some(preferences.model).filter(|model| !model.is_empty()),
    };
    let connection = match Connection::establish(&handle, options) {
        Ok(Some(connection)) => Some(connection),
        Ok(None) => {
            warn!("Backend module offers no client; using demo mode");
            None
        }
        Err(err) => {
            warn!(error = %err, "Backend client construction failed; using demo mode");
            None
        }
    };

    CycleOutcome {
        loaded_version: Some(handle.version()),
        connection,
    }
}
