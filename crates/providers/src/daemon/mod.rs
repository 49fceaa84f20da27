//! Local daemon provider
//!
//! Talks to an Ollama-compatible model server over loopback HTTP. The
//! daemon handles concurrent independent requests, so one provider
//! instance can be shared across sessions.

mod client;
mod streaming;

pub use client::LocalDaemonProvider;
