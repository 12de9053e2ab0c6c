pub mod adapter;
pub mod config;
pub mod demo;
pub mod fragments;
pub mod message;
pub mod preferences;
mod reply;
pub mod status;

pub use adapter::ChatAdapter;
pub use status::ConnectivityStatus;
