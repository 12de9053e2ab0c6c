//! Scriptable in-process backend for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use super::{
    BackendClient, BackendError, BackendHandle, BackendLoader, BackendModule, ChatCompletions,
    ChatHelper, ClientConstructor, Completion, GenerateText, LoadError,
};
use crate::api::{ChatRequest, ClientOptions, GenerateTextRequest};
use crate::core::message::Message;

#[derive(Default)]
pub(crate) struct MockCalls {
    pub loads: AtomicUsize,
    pub constructs: AtomicUsize,
    pub completions: AtomicUsize,
    pub generate: AtomicUsize,
    pub chat: AtomicUsize,
    pub last_options: Mutex<Option<ClientOptions>>,
    pub last_chat_request: Mutex<Option<ChatRequest>>,
    pub last_generate_request: Mutex<Option<GenerateTextRequest>>,
}

impl MockCalls {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn generate(&self) -> usize {
        self.generate.load(Ordering::SeqCst)
    }

    pub fn chat(&self) -> usize {
        self.chat.load(Ordering::SeqCst)
    }

    pub fn backend_calls(&self) -> usize {
        self.completions() + self.generate() + self.chat()
    }
}

#[derive(Clone)]
enum CompletionScript {
    Events(Vec<Result<Value, BackendError>>),
    Single(Value),
    Fail,
}

fn failure(capability: &str) -> BackendError {
    BackendError::Transport(format!("{capability} exploded"))
}

/// A backend whose load outcome and capability surface are set up with
/// builder methods. It acts as loader, module, constructor and client at
/// once; every call is counted in [`MockCalls`].
#[derive(Clone)]
pub(crate) struct MockBackend {
    pub calls: Arc<MockCalls>,
    completion: Option<CompletionScript>,
    generate: Option<Result<Value, ()>>,
    chat: Option<Result<Value, ()>>,
    constructible: bool,
    construct_fails: bool,
    load_fails: bool,
    load_delay: Option<Duration>,
    load_never_finishes: bool,
    version: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(MockCalls::default()),
            completion: None,
            generate: None,
            chat: None,
            constructible: true,
            construct_fails: false,
            load_fails: false,
            load_delay: None,
            load_never_finishes: false,
            version: None,
        }
    }

    pub fn with_streaming_events(mut self, events: Vec<Result<Value, BackendError>>) -> Self {
        self.completion = Some(CompletionScript::Events(events));
        self
    }

    pub fn with_single_completion(mut self, response: Value) -> Self {
        self.completion = Some(CompletionScript::Single(response));
        self
    }

    pub fn with_failing_completions(mut self) -> Self {
        self.completion = Some(CompletionScript::Fail);
        self
    }

    pub fn with_generate(mut self, response: Value) -> Self {
        self.generate = Some(Ok(response));
        self
    }

    pub fn with_failing_generate(mut self) -> Self {
        self.generate = Some(Err(()));
        self
    }

    pub fn with_chat(mut self, response: Value) -> Self {
        self.chat = Some(Ok(response));
        self
    }

    pub fn with_failing_chat(mut self) -> Self {
        self.chat = Some(Err(()));
        self
    }

    pub fn without_constructor(mut self) -> Self {
        self.constructible = false;
        self
    }

    pub fn with_failing_constructor(mut self) -> Self {
        self.construct_fails = true;
        self
    }

    pub fn with_failing_load(mut self) -> Self {
        self.load_fails = true;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn with_pending_load(mut self) -> Self {
        self.load_never_finishes = true;
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn loader(&self) -> Arc<dyn BackendLoader> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl BackendLoader for MockBackend {
    async fn load(&self) -> Result<BackendHandle, LoadError> {
        self.calls.loads.fetch_add(1, Ordering::SeqCst);
        if self.load_never_finishes {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        if self.load_fails {
            return Err(LoadError::Unreachable("mock load failure".to_string()));
        }
        Ok(BackendHandle::new(Arc::new(self.clone())))
    }
}

impl BackendModule for MockBackend {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn client_constructor(&self) -> Option<Arc<dyn ClientConstructor>> {
        if self.constructible {
            Some(Arc::new(self.clone()))
        } else {
            None
        }
    }

    fn chat_helper(&self) -> Option<Arc<dyn ChatHelper>> {
        self.chat.as_ref().map(|_| Arc::new(self.clone()) as Arc<dyn ChatHelper>)
    }
}

impl ClientConstructor for MockBackend {
    fn construct(&self, options: ClientOptions) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.calls.constructs.fetch_add(1, Ordering::SeqCst);
        *self.calls.last_options.lock().unwrap() = Some(options);
        if self.construct_fails {
            return Err(BackendError::Construct("mock constructor failure".to_string()));
        }
        Ok(Arc::new(self.clone()))
    }
}

impl BackendClient for MockBackend {
    fn chat_completions(&self) -> Option<Arc<dyn ChatCompletions>> {
        self.completion
            .as_ref()
            .map(|_| Arc::new(self.clone()) as Arc<dyn ChatCompletions>)
    }

    fn generate_text(&self) -> Option<Arc<dyn GenerateText>> {
        self.generate
            .as_ref()
            .map(|_| Arc::new(self.clone()) as Arc<dyn GenerateText>)
    }
}

#[async_trait]
impl ChatCompletions for MockBackend {
    async fn create(&self, request: ChatRequest) -> Result<Completion, BackendError> {
        self.calls.completions.fetch_add(1, Ordering::SeqCst);
        *self.calls.last_chat_request.lock().unwrap() = Some(request);
        match self.completion.clone() {
            Some(CompletionScript::Events(events)) => {
                Ok(Completion::Incremental(Box::pin(stream::iter(events))))
            }
            Some(CompletionScript::Single(response)) => Ok(Completion::Single(response)),
            Some(CompletionScript::Fail) | None => Err(failure("completions")),
        }
    }
}

#[async_trait]
impl GenerateText for MockBackend {
    async fn generate(&self, request: GenerateTextRequest) -> Result<Value, BackendError> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        *self.calls.last_generate_request.lock().unwrap() = Some(request);
        match &self.generate {
            Some(Ok(response)) => Ok(response.clone()),
            _ => Err(failure("generate")),
        }
    }
}

#[async_trait]
impl ChatHelper for MockBackend {
    async fn chat(&self, _messages: Vec<Message>) -> Result<Value, BackendError> {
        self.calls.chat.fetch_add(1, Ordering::SeqCst);
        match &self.chat {
            Some(Ok(response)) => Ok(response.clone()),
            _ => Err(failure("chat")),
        }
    }
}

/// Loader that hands out a different backend on each successive load.
pub(crate) struct SequencedLoader {
    backends: Vec<MockBackend>,
    next: AtomicUsize,
}

impl SequencedLoader {
    pub fn new(backends: Vec<MockBackend>) -> Self {
        Self {
            backends,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BackendLoader for SequencedLoader {
    async fn load(&self) -> Result<BackendHandle, LoadError> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let backend = self
            .backends
            .get(index)
            .or_else(|| self.backends.last())
            .cloned()
            .ok_or(LoadError::NotConfigured)?;
        backend.load().await
    }
}
