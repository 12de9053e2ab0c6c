//! Reply production against a connected backend.
//!
//! Capabilities are tried in priority order. A missing capability or a failed
//! call moves on to the next one; when none answers, the demo reply is
//! streamed instead. Only a failure while consuming an incremental result
//! reaches the caller.

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use super::demo::{demo_stream, DemoPacing};
use super::fragments::{ChatError, FragmentResult};
use super::message::{last_user_content, Message};
use crate::api::extract::{chat_helper_text, completion_text, generated_text, stream_event_text};
use crate::api::{ChatRequest, GenerateTextRequest};
use crate::backend::{Capability, Completion, Connection};

pub(crate) fn backend_reply(
    connection: Connection,
    model: String,
    conversation: Vec<Message>,
    pacing: DemoPacing,
) -> impl Stream<Item = FragmentResult> + Send + 'static {
    try_stream! {
        let plan = connection.capabilities();
        debug!(plan = ?plan, "Detected backend capabilities");
        let mut answered = false;

        for capability in plan {
            match capability {
                Capability::StructuredStreaming(completions) => {
                    let request = ChatRequest {
                        model: model.clone(),
                        messages: conversation.clone(),
                        stream: true,
                    };
                    match completions.create(request).await {
                        Ok(Completion::Incremental(mut events)) => {
                            while let Some(event) = events.next().await {
                                let event = event.map_err(ChatError::Stream)?;
                                yield stream_event_text(&event);
                            }
                            answered = true;
                        }
                        Ok(Completion::Single(response)) => {
                            yield completion_text(&response);
                            answered = true;
                        }
                        Err(err) => {
                            debug!(error = %err, "Structured chat completion failed; trying next capability");
                        }
                    }
                }
                Capability::SingleShotGenerate(generate) => {
                    let request = GenerateTextRequest {
                        model: model.clone(),
                        prompt: last_user_content(&conversation).to_string(),
                    };
                    match generate.generate(request).await {
                        Ok(response) => {
                            yield generated_text(&response);
                            answered = true;
                        }
                        Err(err) => {
                            debug!(error = %err, "Text generation failed; trying next capability");
                        }
                    }
                }
                Capability::GenericChat(helper) => {
                    match helper.chat(conversation.clone()).await {
                        Ok(response) => {
                            yield chat_helper_text(&response);
                            answered = true;
                        }
                        Err(err) => {
                            debug!(error = %err, "Chat helper failed; trying next capability");
                        }
                    }
                }
                Capability::Unavailable => {
                    debug!("Backend offers no reply capability");
                }
            }

            if answered {
                break;
            }
        }

        if !answered {
            debug!("No backend capability answered; streaming demo reply");
            let mut fallback = Box::pin(demo_stream(&conversation, pacing));
            while let Some(token) = fallback.next().await {
                yield token;
            }
        }
    }
}

pub(crate) fn offline_reply(
    conversation: &[Message],
    pacing: DemoPacing,
) -> impl Stream<Item = FragmentResult> + Send + 'static {
    demo_stream(conversation, pacing).map(Ok)
}
