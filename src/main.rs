use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ollabot::app::{self, ServeOptions};
use ollabot::infrastructure::config::load_dotenv;
use ollabot::interfaces::cli::{self, DEFAULT_API_URL, EMPTY_LOGS_WARNING, EMPTY_QUERY_WARNING};

#[derive(Parser)]
#[command(
    name = "ollabot",
    version,
    about = "Ask questions of your database and triage error logs with a local LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Config file (defaults to $OLLABOT_CONFIG or configs/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask a question about the database
    Ask {
        #[arg(long, short)]
        question: String,
        #[arg(long, default_value = "postgres")]
        db_type: String,
        #[arg(long, env = "OLLABOT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
    },
    /// Summarize errors in a log file and suggest fixes
    AnalyzeLogs {
        /// Log file; reads stdin when omitted or `-`
        #[arg(long, short)]
        file: Option<PathBuf>,
        #[arg(long, env = "OLLABOT_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before parsing and tracing, so `.env` can supply OLLABOT_API_URL and RUST_LOG.
    load_dotenv();
    let args = Cli::parse();

    match args.command {
        Command::Serve { config, host, port } => {
            app::init_tracing("info");
            match app::serve(config.as_deref(), ServeOptions { host, port }).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Ask {
            question,
            db_type,
            api_url,
        } => {
            app::init_tracing("warn");
            report(
                cli::ask(&api_url, &db_type, &question).await,
                EMPTY_QUERY_WARNING,
            )
        }
        Command::AnalyzeLogs { file, api_url } => {
            app::init_tracing("warn");
            let logs = match cli::read_logs(file.as_deref()) {
                Ok(logs) => logs,
                Err(e) => {
                    eprintln!("Error: {}", e.detail());
                    return ExitCode::FAILURE;
                }
            };
            report(cli::analyze_logs(&api_url, &logs).await, EMPTY_LOGS_WARNING)
        }
    }
}

fn report(result: ollabot::domain::error::Result<Option<String>>, empty_warning: &str) -> ExitCode {
    match result {
        Ok(Some(output)) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("{}", empty_warning);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e.detail());
            ExitCode::FAILURE
        }
    }
}
