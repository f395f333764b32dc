use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands {
    pub mod ask;
    pub mod chapters;
    pub mod chat;
    pub mod search;
}

use commands::{ask, chapters, chat, search};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the relay server
    #[arg(long, env = "BOLD_RELAY_URL", default_value = "http://127.0.0.1:3000", global = true)]
    relay_url: String,

    /// Tenant the videos belong to
    #[arg(long, env = "BOLD_SUBDOMAIN", default_value = "default", global = true)]
    subdomain: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question about a video and stream the answer
    Ask {
        /// Video to ask about
        video: String,
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Start an interactive conversation about a video
    Chat {
        /// Video to talk about
        video: String,
    },

    /// Search the portal's videos
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// List the chapters of a WEBVTT chapter track
    Chapters {
        /// Path to the .vtt file
        file: PathBuf,
    },
}

fn endpoint(relay_url: &str, path: &str) -> String {
    format!("{}{}", relay_url.trim_end_matches('/'), path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so streamed answers stay clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(relay_url = %cli.relay_url, subdomain = %cli.subdomain, "dispatching command");

    match cli.command {
        Command::Ask { video, question } => {
            ask::execute(
                endpoint(&cli.relay_url, bold::consumer::DEFAULT_ENDPOINT),
                video,
                cli.subdomain,
                question.join(" "),
            )
            .await
        }
        Command::Chat { video } => {
            chat::execute(
                endpoint(&cli.relay_url, bold::consumer::DEFAULT_ENDPOINT),
                video,
                cli.subdomain,
            )
            .await
        }
        Command::Search { query } => {
            search::execute(endpoint(&cli.relay_url, "/api/search"), query.join(" ")).await
        }
        Command::Chapters { file } => chapters::execute(&file),
    }
}
