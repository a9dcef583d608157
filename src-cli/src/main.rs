use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatdbg_core::config::Config;
use chatdbg_core::error::AppError;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::IngestOutcome;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("CLI_OUTPUT_FAILED", "Failed to encode output").with_details(e.to_string())
    })
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let config = Config::load_from(&cli.config)?;
    match &cli.command {
        Commands::Ingest(args) => match commands::ingest(&config, args)? {
            IngestOutcome::Preview(preview) => println!("{}", to_json(&preview)?),
            IngestOutcome::Imported(summary) => {
                println!("imported {} fragments, skipped {}", summary.inserted, summary.skipped);
                for w in summary.warnings.iter() {
                    let details = w.details.as_deref().unwrap_or("");
                    println!("  {}: {} ({details})", w.code, w.message);
                }
            }
        },
        Commands::Index => {
            let st = commands::index(&config)?;
            println!(
                "index ready: {} of {} fragments, dims {}",
                st.fragment_count,
                st.fragments_total,
                st.dims.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())
            );
        }
        Commands::Ask { question, json } => {
            let answer = commands::ask(&config, question)?;
            if *json {
                println!("{}", to_json(&answer)?);
            } else {
                println!("{}\n{}", answer.answer, commands::sources_line(&answer));
            }
        }
        Commands::Chat => commands::chat(&config)?,
        Commands::History { limit } => {
            for entry in commands::history(&config, *limit)? {
                println!("{}", to_json(&entry)?);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = %e.code, details = ?e.details, "command failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
