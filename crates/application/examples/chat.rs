//! Offline chat demo
//!
//! Wires an agent to the local daemon with the rule-based responder as
//! fallback, so the REPL works even with no daemon running.
//!
//! Run with: `cargo run --example chat`

#![allow(clippy::print_stdout)]

use std::io::{BufRead, Write};
use std::sync::Arc;

use application::{Agent, AgentConfig, ProviderRegistry};
use providers::{LocalDaemonProvider, RuleBasedProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let registry = ProviderRegistry::new()
        .with(Arc::new(LocalDaemonProvider::with_defaults()?))
        .with(Arc::new(RuleBasedProvider::with_defaults()));

    let config = AgentConfig::for_primary("local-daemon")
        .with_fallback_chain(["rule-based"])
        .with_system_prompt("You are a helpful assistant. Keep replies short.");
    let agent = Agent::new(&registry, config)?;

    for status in registry.availability().await {
        println!(
            "provider {:<14} ({}) available: {}",
            status.id, status.kind, status.available
        );
    }
    println!("Type a message, or an empty line to quit.\n");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        let turn = agent.chat(message).await;
        println!("{}\n", turn.text);
    }

    Ok(())
}
