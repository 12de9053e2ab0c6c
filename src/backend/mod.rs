//! The capability surface of an external AI backend.
//!
//! A backend is brought up through a [`BackendLoader`], which yields a
//! [`BackendModule`]. The module may offer a [`ClientConstructor`] and a
//! module-level [`ChatHelper`]; a constructed [`BackendClient`] may offer
//! [`ChatCompletions`] and [`GenerateText`]. Every capability is optional and
//! probed through an `Option` accessor, so a missing one is an ordinary
//! fall-through rather than an error.

pub mod capability;
pub mod error;
pub mod http;
pub mod sse;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::api::{ChatRequest, ClientOptions, GenerateTextRequest};
use crate::core::message::Message;

pub use capability::{detect_capabilities, Capability};
pub use error::{BackendError, LoadError};

/// Elements of an incremental chat-completion result, in arrival order.
pub type EventStream = BoxStream<'static, Result<Value, BackendError>>;

/// What a chat-completion call produced.
pub enum Completion {
    /// Elements arrive one by one and are consumed as they come.
    Incremental(EventStream),
    /// The whole response arrived at once.
    Single(Value),
}

#[async_trait]
pub trait ChatCompletions: Send + Sync {
    async fn create(&self, request: ChatRequest) -> Result<Completion, BackendError>;
}

#[async_trait]
pub trait GenerateText: Send + Sync {
    async fn generate(&self, request: GenerateTextRequest) -> Result<Value, BackendError>;
}

#[async_trait]
pub trait ChatHelper: Send + Sync {
    async fn chat(&self, messages: Vec<Message>) -> Result<Value, BackendError>;
}

pub trait BackendClient: Send + Sync {
    fn chat_completions(&self) -> Option<Arc<dyn ChatCompletions>> {
        None
    }

    fn generate_text(&self) -> Option<Arc<dyn GenerateText>> {
        None
    }
}

pub trait ClientConstructor: Send + Sync {
    fn construct(&self, options: ClientOptions) -> Result<Arc<dyn BackendClient>, BackendError>;
}

pub trait BackendModule: Send + Sync {
    fn version(&self) -> Option<String> {
        None
    }

    fn client_constructor(&self) -> Option<Arc<dyn ClientConstructor>> {
        None
    }

    fn chat_helper(&self) -> Option<Arc<dyn ChatHelper>> {
        None
    }
}

/// A successfully loaded backend module.
#[derive(Clone)]
pub struct BackendHandle {
    pub module: Arc<dyn BackendModule>,
}

impl BackendHandle {
    pub fn new(module: Arc<dyn BackendModule>) -> Self {
        Self { module }
    }

    pub fn version(&self) -> Option<String> {
        self.module.version()
    }
}

/// Brings up the backend module. Called once per initialization cycle.
#[async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self) -> Result<BackendHandle, LoadError>;
}

/// Loader used when no backend is configured; every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredLoader;

#[async_trait]
impl BackendLoader for UnconfiguredLoader {
    async fn load(&self) -> Result<BackendHandle, LoadError> {
        Err(LoadError::NotConfigured)
    }
}

/// A constructed client together with the module it came from.
#[derive(Clone)]
pub struct Connection {
    pub module: Arc<dyn BackendModule>,
    pub client: Arc<dyn BackendClient>,
}

impl Connection {
    /// Builds a client from a loaded module. `Ok(None)` means the module has no
    /// client constructor.
    pub fn establish(
        handle: &BackendHandle,
        options: ClientOptions,
    ) -> Result<Option<Connection>, BackendError> {
        let Some(constructor) = handle.module.client_constructor() else {
            return Ok(None);
        };
        let client = constructor.construct(options)?;
        Ok(Some(Connection {
            module: Arc::clone(&handle.module),
            client,
        }))
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        detect_capabilities(self.client.as_ref(), self.module.as_ref())
    }
}
