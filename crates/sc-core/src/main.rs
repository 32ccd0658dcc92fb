use std::io::{self, IsTerminal, Read};

use sc_core::app;
use sc_core::batch::run_batch;
use sc_core::config::Config;
use sc_core::markdown::MarkdownRenderer;
use sc_core::style::Theme;
use sc_core::transport::ChatClient;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("streamchat — terminal client for a streaming chat relay");
    println!();
    println!("Usage:");
    println!("  streamchat                      Interactive chat");
    println!("  streamchat \"prompt\"             Batch mode (non-interactive)");
    println!("  echo \"prompt\" | streamchat      Batch mode via stdin pipe");
    println!();
    println!("Options:");
    println!("  --relay <url>     Relay chat endpoint (overrides config)");
    println!("  --version         Print version");
    println!("  --help            Print this help");
    println!();
    println!("Keys:");
    println!("  enter             Send message");
    println!("  esc               Cancel the reply in progress");
    println!("  tab / shift+tab   Focus next / previous code block");
    println!("  ctrl+y            Copy focused code block");
    println!("  ctrl+t            Show or hide reasoning");
    println!("  pgup / pgdn       Scroll");
    println!("  ctrl+c            Quit");
}

/// Logs go to stderr and only when `RUST_LOG` is set, so they never
/// interleave with the full-screen UI by default.
fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_default_env() else {
        return;
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("streamchat {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    init_tracing();

    let mut config = Config::load_or_default();

    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--relay" {
            match iter.next() {
                Some(url) => config.relay.url = url.clone(),
                None => {
                    eprintln!("error: --relay needs a URL");
                    std::process::exit(2);
                }
            }
        } else if let Some(url) = arg.strip_prefix("--relay=") {
            config.relay.url = url.to_string();
        } else if !arg.starts_with('-') {
            positional.push(arg.clone());
        }
    }

    // Detect batch mode: positional arg or piped stdin
    let stdin_is_pipe = !io::stdin().is_terminal();
    let prompt = if !positional.is_empty() {
        Some(positional.join(" "))
    } else if stdin_is_pipe {
        let mut buf = String::new();
        if io::stdin().read_to_string(&mut buf).is_ok() && !buf.trim().is_empty() {
            Some(buf.trim().to_string())
        } else {
            None
        }
    } else {
        None
    };

    let client = match ChatClient::new(&config.relay.url, config.relay.idle_timeout()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: failed to create HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Some(prompt) = prompt {
        let code = runtime.block_on(run_batch(&client, &prompt));
        std::process::exit(code);
    }

    if !io::stdin().is_terminal() {
        eprintln!("error: interactive mode needs a terminal; pass a prompt for batch mode");
        std::process::exit(1);
    }

    let renderer = MarkdownRenderer::new(config.render.extensions(), Theme::new(config.render.color));
    if let Err(e) = runtime.block_on(app::run(client, renderer)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
