//! Command-line argument parsing

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Upload and download files through a presigned-URL file API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// API origin (overrides config and FILERELAY_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Auth token (overrides config and FILERELAY_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Session id (overrides config and FILERELAY_SESSION_ID)
    #[arg(long, global = true)]
    pub session_id: Option<String>,

    /// Config file path (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file
    Upload {
        path: PathBuf,

        /// Retry retryable failures using the configured budget
        #[arg(long)]
        retry: bool,
    },

    /// Download a stored file
    Download {
        /// Server-side file name
        filename: String,

        /// Name to save under when the server sends none
        #[arg(long)]
        name: Option<String>,

        /// Target directory (overrides config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Print the URL of a stored file
    Url {
        filename: String,

        /// Download URL instead of the preview URL
        #[arg(long, conflicts_with = "auth")]
        download: bool,

        /// Append credentials as query parameters
        #[arg(long)]
        auth: bool,
    },

    /// Show the detected type, size and validation outcome of a local file
    Check { path: PathBuf },

    /// Manage the profile image
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Write the effective settings to the config file
    SaveConfig(SaveConfigArgs),
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Upload a new profile image
    Upload { path: PathBuf },
    /// Remove the current profile image
    Remove,
}

#[derive(ClapArgs, Debug)]
pub struct SaveConfigArgs {
    /// Default download directory to store
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
}
