//! Request payloads sent to backend capabilities and the helpers that pull
//! reply text out of their loosely-shaped JSON responses.

pub mod extract;

use serde::Serialize;

use crate::core::message::Message;

/// Arguments of the structured chat-completion capability.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// Arguments of the single-shot generate-text capability.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GenerateTextRequest {
    pub model: String,
    pub prompt: String,
}

/// Options handed to a backend client constructor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub token: Option<String>,
    pub model: Option<String>,
}
