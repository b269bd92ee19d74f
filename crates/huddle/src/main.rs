//! Huddle server daemon.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin huddled -- --token t1=u-1:Alice --token t2=u-2:Bob
//! cargo run --bin huddled -- --addr 0.0.0.0:8080 --require-game-auth
//! ```

use clap::Parser;
use huddle::logging::setup_logger;
use huddle::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "huddled")]
#[command(about = "Realtime chat, signaling and game rooms over WebSockets", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Accepted bearer token, as TOKEN=ID:NAME (repeatable)
    #[arg(short, long = "token", value_name = "TOKEN=ID:NAME")]
    tokens: Vec<String>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Refuse game connections that carry no token
    #[arg(long)]
    require_game_auth: bool,
}

#[tokio::main]
async fn main() -> Result<(), HuddleError> {
    let args = Args::parse();
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let auth = StaticAuthenticator::from_entries(&args.tokens)?;
    if auth.is_empty() {
        tracing::warn!("no tokens configured, chat rooms will refuse every client");
    }

    let server = HuddleServerBuilder::new()
        .bind(&args.addr)
        .allow_anonymous_game(!args.require_game_auth)
        .build(auth, MemoryChatStore::new())
        .await?;

    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, tokens = args.tokens.len(), "huddled listening");
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
