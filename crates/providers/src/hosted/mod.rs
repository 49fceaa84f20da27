//! Hosted API provider
//!
//! Talks to a remote OpenAI-compatible inference endpoint. Subject to
//! authentication, rate limits, and transient upstream failures; 5xx
//! statuses read as "unavailable", 4xx as backend errors.

mod client;
mod streaming;

pub use client::HostedApiProvider;
