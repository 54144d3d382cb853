//! pdta-assist - conversational assistant for the PDTA lung cancer pathway

mod config;
mod ui;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;

use pdta_agent::{AgentSession, ProviderRuntime, SessionOptions, SessionRegistry};
use pdta_runtime::providers::OpenAIProvider;
use pdta_tui::Theme;

/// pdta-assist - clinical assistant over the PDTA Tumore del Polmone
#[derive(Parser, Debug)]
#[command(name = "pdta-assist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4o-mini)
    #[arg(short, long)]
    model: Option<String>,

    /// Disable streaming (wait for the complete reply)
    #[arg(long)]
    no_stream: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// Run in non-interactive mode with a single question
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("pdta_agent=debug,pdta_runtime=debug,pdta_cli=debug")
            .init();
    }

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // CLI flags win over the config file
    let model = args
        .model
        .or(cfg.model.clone())
        .unwrap_or_else(|| pdta_agent::session::DEFAULT_MODEL.to_string());
    let streaming = if args.no_stream {
        false
    } else {
        cfg.streaming.unwrap_or(true)
    };
    let use_tui = !args.no_tui && cfg.tui.unwrap_or(true);
    let theme = Theme::by_name(cfg.theme.as_deref().unwrap_or("dark"));

    // Missing credential is fatal before any request is served
    let Some(api_key) = cfg.get_api_key() else {
        eprintln!("Error: no OpenAI API key found");
        eprintln!();
        eprintln!("Set your API key with: export OPENAI_API_KEY=your-key");
        eprintln!("Or add it to the config file: pdta-assist --init-config");
        std::process::exit(1);
    };

    let mut provider = OpenAIProvider::new(api_key);
    if let Some(ref base_url) = cfg.base_url {
        provider = provider.with_base_url(base_url.clone());
    }

    let options = SessionOptions {
        model,
        request_timeout: Duration::from_secs(cfg.request_timeout_secs.unwrap_or(120)),
        ..Default::default()
    };

    let runtime = Arc::new(ProviderRuntime::new(provider));
    let mut registry = SessionRegistry::new(runtime, options);
    let session_id = registry.create();
    tracing::info!(session_id = %session_id, streaming, tui = use_tui, "starting");
    let session = registry
        .get_mut(&session_id)
        .expect("freshly created session");

    // Non-interactive mode
    if let Some(question) = args.command {
        return run_command(session, &question, streaming).await;
    }

    if use_tui {
        return ui::run_tui(session, streaming, theme).await;
    }

    run_interactive(session, streaming).await
}

/// Answer a single question and exit
async fn run_command(
    session: &mut AgentSession,
    question: &str,
    streaming: bool,
) -> anyhow::Result<()> {
    if streaming {
        let mut reply = std::pin::pin!(session.submit_streaming(question));
        while let Some(chunk) = reply.next().await {
            print!("{}", chunk);
            std::io::stdout().flush()?;
        }
        println!();
    } else {
        println!("{}", session.submit_blocking(question).await);
    }
    Ok(())
}

/// Simple stdin/stdout loop
async fn run_interactive(session: &mut AgentSession, streaming: bool) -> anyhow::Result<()> {
    use std::io::{self, IsTerminal};

    if io::stderr().is_terminal() {
        eprintln!("pdta-assist ({})", session.definition().model);
        eprintln!("Scrivi una domanda sul PDTA, o premi Ctrl+D per uscire.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/clear" {
            session.reset();
            println!("Cronologia cancellata.");
            println!();
            continue;
        }

        println!();
        if streaming {
            let mut reply = std::pin::pin!(session.submit_streaming(input));
            while let Some(chunk) = reply.next().await {
                print!("{}", chunk);
                io::stdout().flush()?;
            }
            println!();
        } else {
            println!("{}", session.submit_blocking(input).await);
        }
        println!();
    }

    Ok(())
}
