//! Line-oriented interactive chat loop.

use std::error::Error;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::warn;

use super::status_lines;
use crate::core::adapter::ChatAdapter;
use crate::core::fragments::{FragmentStream, APOLOGY_MESSAGE};
use crate::core::message::Message;
use crate::core::status::ConnectivityStatus;
use crate::utils::logging::LoggingState;

pub const GREETING: &str = "Hi! How can I help you today?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Model(Option<String>),
    Key(Option<String>),
    Status,
    Log(Option<String>),
    Quit,
    Unknown(String),
}

/// Parses a slash command; `None` means the input is an ordinary message.
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let rest = input.strip_prefix('/')?;
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let argument = (!argument.is_empty()).then(|| argument.to_string());

    Some(match name {
        "model" => ChatCommand::Model(argument),
        "key" => ChatCommand::Key(argument),
        "status" => ChatCommand::Status,
        "log" => ChatCommand::Log(argument),
        "quit" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    })
}

pub async fn run_chat(
    adapter: ChatAdapter,
    mut logging: LoggingState,
    backend: Option<String>,
) -> Result<(), Box<dyn Error>> {
    println!("💬 chatbridge (model: {})", adapter.model());
    println!("Type a message and press Enter. /quit to leave.");
    println!();
    println!("{GREETING}");
    println!();

    tokio::spawn(report_status_changes(adapter.subscribe_status()));

    let mut conversation = vec![Message::assistant(GREETING)];
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        // SIGINT stops exiting the process once any ctrl_c() listener exists.
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = parse_command(input) {
            if command == ChatCommand::Quit {
                break;
            }
            run_command(command, &adapter, &mut logging, backend.as_deref());
            continue;
        }

        let message = Message::user(input);
        log_or_warn(&logging, &message);
        conversation.push(message);

        let reply = Message::assistant(stream_reply(&adapter, &conversation).await?);
        log_or_warn(&logging, &reply);
        conversation.push(reply);
    }

    println!();
    Ok(())
}

/// How a relayed reply ended.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Every fragment arrived.
    Complete(String),
    /// The interrupt fired first; carries the text received so far.
    Interrupted(String),
    /// The stream failed.
    Failed,
}

impl ReplyOutcome {
    /// Text to keep in the conversation history.
    pub fn into_history_text(self) -> String {
        match self {
            ReplyOutcome::Complete(text) | ReplyOutcome::Interrupted(text) => text,
            ReplyOutcome::Failed => APOLOGY_MESSAGE.to_string(),
        }
    }
}

/// Writes fragments to `out` as they arrive until the stream ends or
/// `interrupt` completes. An interrupt closes the stream, dropping its
/// pending work.
pub async fn relay_reply<W, F>(
    fragments: &mut FragmentStream,
    out: &mut W,
    interrupt: F,
) -> io::Result<ReplyOutcome>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut interrupt = std::pin::pin!(interrupt);
    let mut text = String::new();

    loop {
        tokio::select! {
            fragment = fragments.next() => match fragment {
                Some(Ok(fragment)) => {
                    write!(out, "{fragment}")?;
                    out.flush()?;
                    text.push_str(&fragment);
                }
                Some(Err(err)) => {
                    warn!(error = %err, "Reply stream failed");
                    if !text.is_empty() {
                        writeln!(out)?;
                    }
                    writeln!(out, "{APOLOGY_MESSAGE}")?;
                    writeln!(out)?;
                    return Ok(ReplyOutcome::Failed);
                }
                None => break,
            },
            _ = &mut interrupt => {
                fragments.close();
                write!(out, " [interrupted]")?;
                writeln!(out)?;
                writeln!(out)?;
                return Ok(ReplyOutcome::Interrupted(text));
            }
        }
    }

    writeln!(out)?;
    writeln!(out)?;
    Ok(ReplyOutcome::Complete(text))
}

/// Streams one reply to stdout and returns the text to keep in history.
/// Ctrl+C stops the reply and keeps what arrived so far.
async fn stream_reply(
    adapter: &ChatAdapter,
    conversation: &[Message],
) -> Result<String, Box<dyn Error>> {
    let mut fragments = adapter.send(conversation);
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = relay_reply(&mut fragments, &mut io::stdout(), interrupt).await?;
    Ok(outcome.into_history_text())
}

fn run_command(
    command: ChatCommand,
    adapter: &ChatAdapter,
    logging: &mut LoggingState,
    backend: Option<&str>,
) {
    match command {
        ChatCommand::Model(Some(model)) => {
            adapter.set_model(&model);
            println!("Model set to: {model}");
            if let Err(err) = logging.log_note(&format!("Model set to {model}")) {
                warn!(error = %err, "Failed to write transcript");
            }
        }
        ChatCommand::Model(None) => println!("Model: {}", adapter.model()),
        ChatCommand::Key(Some(key)) => {
            adapter.set_credential(Some(&key));
            println!("API key stored; it is used from the next reconnect (/model).");
        }
        ChatCommand::Key(None) => {
            adapter.set_credential(None);
            println!("API key removed.");
        }
        ChatCommand::Status => {
            for line in status_lines(adapter, backend) {
                println!("{line}");
            }
            println!("Logging: {}", logging.get_status_string());
        }
        ChatCommand::Log(Some(path)) => match logging.set_log_file(PathBuf::from(path)) {
            Ok(message) => println!("{message}"),
            Err(err) => println!("❌ Error setting log file: {err}"),
        },
        ChatCommand::Log(None) => match logging.toggle_logging("Logging paused") {
            Ok(message) => println!("{message}"),
            Err(err) => println!("❌ {err}"),
        },
        ChatCommand::Unknown(name) => {
            println!("Unknown command: /{name}. Try /model, /key, /status, /log or /quit.");
        }
        ChatCommand::Quit => {}
    }
    println!();
}

fn log_or_warn(logging: &LoggingState, message: &Message) {
    if let Err(err) = logging.log_message(message) {
        warn!(error = %err, "Failed to write transcript");
    }
}

async fn report_status_changes(mut receiver: watch::Receiver<ConnectivityStatus>) {
    let mut last = None;
    loop {
        let status = *receiver.borrow_and_update();
        if status.is_settled() && last != Some(status) {
            eprintln!("[{}]", status.label());
        }
        last = Some(status);
        if receiver.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::core::fragments::{ChatError, FragmentResult};
    use futures_util::stream;
    use std::time::Duration;

    fn ok(text: &str) -> FragmentResult {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn relay_writes_every_fragment() {
        let mut fragments = FragmentStream::new(stream::iter(vec![ok("Hi"), ok(" there")]));
        let mut out = Vec::new();
        let outcome = relay_reply(&mut fragments, &mut out, std::future::pending())
            .await
            .expect("relay");

        assert_eq!(outcome, ReplyOutcome::Complete("Hi there".to_string()));
        assert_eq!(String::from_utf8(out).unwrap(), "Hi there\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_closes_stream_and_keeps_partial_text() {
        let partial = stream::iter(vec![ok("par"), ok("tial")]).chain(stream::pending());
        let mut fragments = FragmentStream::new(partial);
        let mut out = Vec::new();
        let interrupt = tokio::time::sleep(Duration::from_millis(50));
        let outcome = relay_reply(&mut fragments, &mut out, interrupt)
            .await
            .expect("relay");

        assert_eq!(outcome, ReplyOutcome::Interrupted("partial".to_string()));
        assert!(fragments.is_closed());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "partial [interrupted]\n\n"
        );
        assert_eq!(
            ReplyOutcome::Interrupted("partial".to_string()).into_history_text(),
            "partial"
        );
    }

    #[tokio::test]
    async fn failed_stream_prints_apology() {
        let mut fragments = FragmentStream::new(stream::iter(vec![
            ok("half"),
            Err(ChatError::Stream(BackendError::Stream("reset".to_string()))),
        ]));
        let mut out = Vec::new();
        let outcome = relay_reply(&mut fragments, &mut out, std::future::pending())
            .await
            .expect("relay");

        assert_eq!(outcome, ReplyOutcome::Failed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("half\n{APOLOGY_MESSAGE}\n\n")
        );
        assert_eq!(outcome.into_history_text(), APOLOGY_MESSAGE);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("hello /model"), None);
    }

    #[test]
    fn commands_with_and_without_arguments() {
        assert_eq!(
            parse_command("/model  google/gemma-2-2b-it "),
            Some(ChatCommand::Model(Some("google/gemma-2-2b-it".to_string())))
        );
        assert_eq!(parse_command("/model"), Some(ChatCommand::Model(None)));
        assert_eq!(
            parse_command("/key hf_abc"),
            Some(ChatCommand::Key(Some("hf_abc".to_string())))
        );
        assert_eq!(parse_command("/key   "), Some(ChatCommand::Key(None)));
        assert_eq!(
            parse_command("/log chat log.txt"),
            Some(ChatCommand::Log(Some("chat log.txt".to_string())))
        );
        assert_eq!(parse_command("/status"), Some(ChatCommand::Status));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(
            parse_command("/help"),
            Some(ChatCommand::Unknown("help".to_string()))
        );
    }
}
