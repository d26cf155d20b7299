use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repostats")]
#[command(about = "RepoStats - GitHub repository language statistics pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: String,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish one date-range assignment per worker to the work queue
    Dispatch {
        /// Days of history each worker covers
        #[arg(long)]
        num_days: i64,

        /// Number of workers to dispatch for
        #[arg(long, default_value = "1")]
        workers: u32,
    },

    /// Run a single assignment in-process, bypassing the queue
    Worker {
        /// Days of history to fetch
        #[arg(long)]
        num_days: i64,

        /// Which block of days to fetch, counting back from today
        #[arg(long, default_value = "0")]
        index: u32,
    },

    /// Merge all stored partial results into the final aggregate
    Merge {
        /// Write the aggregate as JSON to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// How many languages to print
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Initialize database schema
    InitDb,
}
