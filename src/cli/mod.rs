//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, Lines};

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    author = "neur0map",
    about = "Ask questions about your documents",
    long_about = "docqa indexes your documents, expands each question into several related \
                  queries, retrieves and reranks the most relevant passages with a cross-encoder, \
                  and answers from those passages only."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question about the documents
    Ask {
        /// Question to ask
        question: String,

        /// Documents or directories to index (.txt, .md)
        #[arg(short, long = "docs", value_name = "PATH", required = true, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Number of passages to answer from (overrides config)
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Number of query variants to generate (overrides config)
        #[arg(long)]
        variants: Option<usize>,

        /// Show result in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Index documents once, then answer questions read from stdin
    Chat {
        /// Documents or directories to index (.txt, .md)
        #[arg(short, long = "docs", value_name = "PATH", required = true, num_args = 1..)]
        docs: Vec<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// One read from the interactive chat prompt
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Line(String),
    /// End of input
    Eof,
    /// The interrupt fired while waiting (Ctrl-C at the prompt)
    Interrupted,
}

/// Wait for the next chat line, or for `interrupt`, whichever comes first
///
/// `Lines::next_line` is cancel safe, so no input is lost when the interrupt wins.
pub async fn next_chat_input<R, F>(
    lines: &mut Lines<R>,
    interrupt: F,
) -> std::io::Result<ChatInput>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => ChatInput::Line(line),
            None => ChatInput::Eof,
        }),
        _ = interrupt => Ok(ChatInput::Interrupted),
    }
}
