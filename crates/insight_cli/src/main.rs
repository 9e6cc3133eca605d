mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use insight_logging::{insight_info, LogDestination};
use log::LevelFilter;

use crate::commands::{Context, ReviewArgs};
use crate::config::{config_path, ClientConfig, Overrides, API_KEY_ENV};

#[derive(Debug, Parser)]
#[command(name = "insight", version, about = "Submit code for review and follow job results")]
struct Cli {
    /// RON config file (default: ./insight.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Job service base url
    #[arg(long, global = true)]
    api: Option<String>,

    /// Push channel base url
    #[arg(long, global = true)]
    ws: Option<String>,

    /// API key; falls back to the config file, then INSIGHT_API_KEY
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// User id that owns submitted jobs and the push channel
    #[arg(long, global = true)]
    user: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow jobs over the push channel, polling as a fallback
    Watch {
        #[arg(required = true)]
        job_ids: Vec<String>,
    },
    /// Poll a job until it completes, fails or times out
    Poll { job_id: String },
    /// Submit a file for review and wait for the result
    Review {
        file: PathBuf,
        #[arg(long)]
        language: Option<String>,
        /// 1-based cursor line; nearby lines are sent as context
        #[arg(long)]
        line: Option<usize>,
        #[arg(long)]
        no_wait: bool,
        /// Directory for an HTML copy of the result
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Submit a file with an error log for debugging help
    Debug {
        file: PathBuf,
        #[arg(long)]
        error_log: PathBuf,
        #[arg(long)]
        no_wait: bool,
    },
    /// List recent jobs with usage statistics
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Render a saved result text to the terminal or to an HTML file
    Render {
        result: PathBuf,
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Print line diagnostics found in a saved result text
    Diagnostics {
        result: PathBuf,
        /// Reviewed document; line numbers outside it are dropped
        #[arg(long)]
        document: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::load(cli.config.as_deref()).context("cannot load configuration")?;
    init_logging(cli.verbose, config.log_file.clone());
    if let Some(path) = config_path(cli.config.as_deref()) {
        insight_info!("Loaded config from {}", path.display());
    }

    let overrides = Overrides {
        api_base_url: cli.api,
        ws_base_url: cli.ws,
        api_key: cli.api_key,
    };
    let ctx = Context {
        settings: config.to_settings(&overrides, std::env::var(API_KEY_ENV).ok()),
        user_id: cli.user.or(config.user_id),
    };

    match cli.command {
        Command::Watch { job_ids } => commands::watch(&ctx, job_ids).await,
        Command::Poll { job_id } => commands::poll(&ctx, &job_id).await,
        Command::Review {
            file,
            language,
            line,
            no_wait,
            html,
        } => {
            commands::review(
                &ctx,
                ReviewArgs {
                    file,
                    language,
                    cursor_line: line,
                    no_wait,
                    html,
                },
            )
            .await
        }
        Command::Debug {
            file,
            error_log,
            no_wait,
        } => commands::debug(&ctx, &file, &error_log, no_wait).await,
        Command::History { limit } => commands::history(&ctx, limit).await,
        Command::Render { result, html } => commands::render_file(&result, html.as_deref()),
        Command::Diagnostics { result, document } => commands::diagnostics(&result, &document),
    }
}

fn init_logging(verbose: u8, log_file: Option<PathBuf>) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let destination = match log_file {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    insight_logging::initialize(destination, level);
}
