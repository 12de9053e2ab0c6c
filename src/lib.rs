//! Chatbridge is a terminal chat client that streams replies from a backend
//! discovered at runtime, and falls back to an offline demo reply whenever no
//! backend is usable.
//!
//! The crate is organized in a few layers:
//! - [`core`] owns the chat adapter, its connectivity lifecycle, persisted
//!   preferences, configuration, and the demo reply generator.
//! - [`backend`] describes what a loaded backend module may offer and ships
//!   the HTTP implementation of those capabilities.
//! - [`api`] defines the request payloads sent to backends and the helpers
//!   that pull reply text out of their JSON responses.
//! - [`cli`] parses arguments and runs the line-oriented chat loop.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod backend;
pub mod cli;
pub mod core;
pub mod utils;
