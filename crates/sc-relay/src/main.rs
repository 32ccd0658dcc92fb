use std::sync::Arc;

use sc_backend::{CompletionSource, OpenAiClient};
use sc_relay::{routes, RelayConfig};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

fn print_help() {
    println!("streamchat-relay — streaming chat completion relay");
    println!();
    println!("Usage:");
    println!("  streamchat-relay");
    println!();
    println!("Environment:");
    println!("  STREAMCHAT_MODEL          Upstream model name (required)");
    println!("  STREAMCHAT_API_KEY        Upstream API key (falls back to OPENAI_API_KEY)");
    println!("  STREAMCHAT_API_KEY_CMD    Command printing the API key, run via sh -c");
    println!("  STREAMCHAT_BASE_URL       OpenAI-compatible base URL [default: https://api.openai.com/v1]");
    println!("  STREAMCHAT_BIND           Listen address [default: 127.0.0.1:8787]");
    println!("  RUST_LOG                  Log filter [default: info]");
    println!();
    println!("Options:");
    println!("  --version         Print version");
    println!("  --help            Print this help");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("streamchat-relay {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_tracing();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("streamchat-relay: {e}");
            std::process::exit(1);
        }
    };

    let upstream = &config.upstream;
    let client = match OpenAiClient::new(&upstream.api_key, &upstream.base_url, &upstream.model) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("streamchat-relay: failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("streamchat-relay: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    let source: Arc<dyn CompletionSource> = Arc::new(client);
    let code = runtime.block_on(async move {
        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        };

        match warp::serve(routes(source)).try_bind_with_graceful_shutdown(config.bind, shutdown) {
            Ok((addr, server)) => {
                tracing::info!(
                    %addr,
                    model = %config.upstream.model,
                    base_url = %config.upstream.base_url,
                    "relay listening"
                );
                server.await;
                0
            }
            Err(e) => {
                tracing::error!(error = %e, bind = %config.bind, "failed to bind");
                1
            }
        }
    });
    std::process::exit(code);
}
