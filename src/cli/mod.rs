//! Command-line interface parsing and handling
//!
//! `chat` is the default command. Settings come from the config file and
//! environment, and the flags below override both for a single run.

pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::{Config, UpstreamKind};
use crate::logging;
use crate::relay::{self, RelayState};
use crate::ui::repl::run_chat;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_DESCRIBE"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ")\nbuilt: ",
    env!("VERGEN_BUILD_DATE"),
);

#[derive(Parser)]
#[command(name = "relaychat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Streaming chat relay and terminal front-end")]
#[command(
    long_about = "relaychat relays chat messages to a language-model backend and streams \
the reply back token by token.\n\n\
Run 'relaychat serve' to start the relay, then 'relaychat' (or 'relaychat chat') \
to talk to it from the terminal.\n\n\
Environment Variables:\n\
  RELAYCHAT_CONFIG          Path to the config file\n\
  RELAYCHAT_BACKEND_URL     Backend base URL (default http://localhost:8000)\n\
  RELAYCHAT_BIND            Relay listen address (default 127.0.0.1:3000)\n\
  RELAYCHAT_RELAY_URL       Relay base URL for front-ends (default http://localhost:3000)\n\
  RELAYCHAT_UPSTREAM        'backend' or 'openai'\n\
  RELAYCHAT_OPENAI_API_KEY  API key for the openai upstream (or OPENAI_API_KEY)\n\
  RUST_LOG                  Log filter, e.g. 'relaychat=debug'\n\n\
Chat commands:\n\
  /clear            Start a new conversation\n\
  /quit             Exit (Ctrl+D also works)\n\
  Ctrl+C            Cancel the reply being streamed, or exit when idle"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file to use instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Relay base URL used by chat and say
    #[arg(short = 'r', long, global = true, value_name = "URL")]
    pub relay_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat front-end (default)
    Chat,
    /// Send one message and print the streamed reply
    Say {
        /// Message to send (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Run the relay server
    Serve {
        /// Address to listen on
        #[arg(short = 'b', long, value_name = "ADDR")]
        bind: Option<String>,
        /// Backend base URL
        #[arg(long, value_name = "URL")]
        backend_url: Option<String>,
        /// Service to forward chat requests to
        #[arg(long, value_enum)]
        upstream: Option<UpstreamKind>,
    },
    /// Print the resolved configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(relay_url) = args.relay_url {
        config.relay_url = Some(relay_url);
    }

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            logging::init(logging::CLIENT_FILTER);
            run_chat(reqwest::Client::new(), config.relay_url().to_string()).await
        }
        Commands::Say { prompt } => {
            logging::init(logging::CLIENT_FILTER);
            say::run_say(prompt, &config).await
        }
        Commands::Serve {
            bind,
            backend_url,
            upstream,
        } => {
            logging::init(logging::SERVER_FILTER);
            if bind.is_some() {
                config.bind = bind;
            }
            if backend_url.is_some() {
                config.backend_url = backend_url;
            }
            if upstream.is_some() {
                config.upstream = upstream;
            }
            let state = RelayState::from_config(&config);
            relay::serve(config.bind_address(), state, shutdown_signal()).await?;
            Ok(())
        }
        Commands::Config => {
            config.print_all()?;
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Could not listen for Ctrl+C; relay will run until killed");
        std::future::pending::<()>().await;
    }
}
