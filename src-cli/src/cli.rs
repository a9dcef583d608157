use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Ask an archive-grounded persona questions from the terminal.
#[derive(Parser, Debug)]
#[command(name = "chatdbg")]
#[command(about = "Archive-grounded persona chatbot", long_about = None)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, default_value = "chatdbg.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace the corpus with the rows of an archive CSV export
    Ingest(IngestArgs),

    /// Build or refresh the embedding index for the current corpus
    Index,

    /// Answer a single question
    Ask {
        question: String,

        /// Print the answer and sources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer questions line by line from stdin
    Chat,

    /// Show recent interaction log entries
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    pub csv: PathBuf,

    /// Column holding the citation id
    #[arg(long, default_value = "book_id")]
    pub provenance_column: String,

    /// Column grouping rows into source documents
    #[arg(long, default_value = "unit")]
    pub source_column: String,

    /// Column holding the headline
    #[arg(long, default_value = "headline")]
    pub headline_column: String,

    /// Body text columns, concatenated in order
    #[arg(long = "text-column", default_values_t = default_text_columns())]
    pub text_columns: Vec<String>,

    /// Print the first rows and exit without importing
    #[arg(long)]
    pub preview: bool,
}

fn default_text_columns() -> Vec<String> {
    vec!["additional_info".to_string(), "additional_info_2".to_string()]
}
