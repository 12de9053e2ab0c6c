use std::fmt;
use std::sync::Arc;

use super::{BackendClient, BackendModule, ChatCompletions, ChatHelper, GenerateText};

/// One way of obtaining a reply from a connected backend.
#[derive(Clone)]
pub enum Capability {
    StructuredStreaming(Arc<dyn ChatCompletions>),
    SingleShotGenerate(Arc<dyn GenerateText>),
    GenericChat(Arc<dyn ChatHelper>),
    Unavailable,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::StructuredStreaming(_) => "structured-streaming",
            Capability::SingleShotGenerate(_) => "single-shot-generate",
            Capability::GenericChat(_) => "generic-chat",
            Capability::Unavailable => "unavailable",
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probes the client and module once and returns the capabilities to try, in
/// priority order. A backend offering none of them yields `[Unavailable]`.
pub fn detect_capabilities(
    client: &dyn BackendClient,
    module: &dyn BackendModule,
) -> Vec<Capability> {
    let mut plan = Vec::with_capacity(3);
    if let Some(completions) = client.chat_completions() {
        plan.push(Capability::StructuredStreaming(completions));
    }
    if let Some(generate) = client.generate_text() {
        plan.push(Capability::SingleShotGenerate(generate));
    }
    if let Some(chat) = module.chat_helper() {
        plan.push(Capability::GenericChat(chat));
    }
    if plan.is_empty() {
        plan.push(Capability::Unavailable);
    }
    plan
}
