//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use futures_util::StreamExt;

use crate::core::adapter::ChatAdapter;
use crate::core::fragments::APOLOGY_MESSAGE;
use crate::core::message::Message;
use crate::utils::logging::LoggingState;

/// Waits for initialization to settle, then streams the reply to `prompt`.
/// A failed stream prints the apology on stderr and exits non-zero.
pub async fn run_say(
    adapter: ChatAdapter,
    logging: LoggingState,
    prompt: String,
) -> Result<(), Box<dyn Error>> {
    adapter.wait_until_settled().await;

    let conversation = vec![Message::user(prompt)];
    logging.log_message(&conversation[0])?;

    let mut fragments = adapter.send(&conversation);
    let mut stdout = io::stdout();
    let mut reply = String::new();
    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(fragment) => {
                write!(stdout, "{fragment}")?;
                stdout.flush()?;
                reply.push_str(&fragment);
            }
            Err(err) => {
                writeln!(stdout)?;
                eprintln!("❌ {err}");
                eprintln!("{APOLOGY_MESSAGE}");
                std::process::exit(1);
            }
        }
    }
    writeln!(stdout)?;

    logging.log_message(&Message::assistant(reply))?;
    Ok(())
}
