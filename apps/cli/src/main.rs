//! filerelay command-line client.

mod args;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use filerelay_client::config::config_path;
use filerelay_client::{ClientConfig, FileService, Mode, ReqwestTransport, TransferResult};
use filerelay_protocol::FileRecord;
use filerelay_transfer::{Progress, ProgressCallback, UploadFile};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use args::{Args, Command, ProfileCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    tracing::debug!(api = %config.api_url, "configuration loaded");

    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let service = Arc::new(FileService::new(config, Arc::new(transport)));

    // Ctrl-C cancels whatever is in flight; the command then reports it.
    let watcher = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let count = service.registry().cancel_all();
                tracing::info!(count, "transfers canceled");
            }
        })
    };

    let result = run(&service, args).await;
    watcher.abort();
    result
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = ClientConfig::load_from(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => ClientConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            ClientConfig::default()
        }),
    };
    apply_flags(&mut config, args);
    if let Command::Download { dir: Some(dir), .. } = &args.command {
        config.download_dir = dir.clone();
    }
    Ok(config)
}

/// Command-line flags win over the file and the environment.
fn apply_flags(config: &mut ClientConfig, args: &Args) {
    if let Some(v) = &args.api_url {
        config.api_url = v.clone();
    }
    if let Some(v) = &args.token {
        config.token = v.clone();
    }
    if let Some(v) = &args.session_id {
        config.session_id = v.clone();
    }
}

async fn run(service: &FileService, args: Args) -> anyhow::Result<()> {
    let credentials = service.credentials();
    let creds = credentials.as_ref();

    match args.command {
        Command::Upload { path, retry } => {
            let file = read_file(service, &path).await?;
            let progress: ProgressCallback = Arc::new(|p: Progress| {
                tracing::debug!(task = %p.task_id, percent = p.percent, "upload progress");
            });

            let budget = if retry { service.config().retry_attempts } else { 0 };
            let mut attempt = 0;
            let result = loop {
                let result = service.upload(&file, Some(progress.clone()), creds).await?;
                if result.success || !result.retryable || attempt >= budget {
                    break result;
                }
                attempt += 1;
                tracing::warn!(attempt, reason = %result.message, "retrying upload");
                tokio::time::sleep(service.config().retry_delay()).await;
            };
            report(&result)
        }
        Command::Download { filename, name, .. } => {
            let display_name = name.unwrap_or_else(|| filename.clone());
            let result = service.download(&filename, &display_name, creds).await?;
            report(&result)
        }
        Command::Url {
            filename,
            download,
            auth,
        } => {
            let url = if download {
                service.file_url(&filename, Mode::Download)
            } else {
                let record = FileRecord {
                    filename,
                    ..Default::default()
                };
                service.preview_url(&record, creds, auth)
            };
            println!("{url}");
            Ok(())
        }
        Command::Check { path } => {
            let file = read_file(service, &path).await?;
            let check = FileCheck {
                name: file.name(),
                kind: service.file_type(file.name()),
                mime_type: file.mime_type(),
                size: service.format_file_size(file.size()),
                rejection: service.validate(Some(&file.descriptor)).err().map(|e| e.to_string()),
            };
            println!("{}", serde_json::to_string_pretty(&check)?);
            Ok(())
        }
        Command::Profile(ProfileCommand::Upload { path }) => {
            let file = read_file(service, &path).await?;
            let result = service.upload_profile_image(&file, creds).await?;
            report(&result)
        }
        Command::Profile(ProfileCommand::Remove) => {
            let result = service.remove_profile_image(creds).await?;
            report(&result)
        }
        Command::SaveConfig(save) => {
            let path = match args.config {
                Some(p) => p,
                None => config_path().context("no config directory available")?,
            };
            let mut config = service.config().clone();
            if let Some(dir) = save.download_dir {
                config.download_dir = dir;
            }
            config
                .save_to(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn read_file(service: &FileService, path: &Path) -> anyhow::Result<UploadFile> {
    UploadFile::from_path(path, service.validator())
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileCheck<'a> {
    name: &'a str,
    kind: &'static str,
    mime_type: &'a str,
    size: String,
    /// Rejection reason, absent when the file would be accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection: Option<String>,
}

/// Prints the result as JSON and turns a failure into a non-zero exit.
fn report<T: Serialize>(result: &TransferResult<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if !result.success {
        bail!("{}", result.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "filerelay",
            "--token",
            "cli-token",
            "url",
            "a.png",
        ]);
        let mut config = ClientConfig {
            api_url: "https://from-file".into(),
            token: "file-token".into(),
            ..Default::default()
        };
        apply_flags(&mut config, &args);
        assert_eq!(config.api_url, "https://from-file");
        assert_eq!(config.token, "cli-token");
    }

    #[test]
    fn load_config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_url":"https://api.test","download_dir":"/tmp/dl"}"#)
            .unwrap();
        let args = Args::parse_from([
            "filerelay",
            "--config",
            path.to_str().unwrap(),
            "download",
            "a.txt",
            "--dir",
            "/tmp/other",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.download_dir, std::path::PathBuf::from("/tmp/other"));
    }

    #[test]
    fn report_fails_on_unsuccessful_result() {
        let ok = TransferResult::done("Profile image removed.", ());
        assert!(report(&ok).is_ok());

        let failed: TransferResult<()> = TransferResult::rejected("No file selected.");
        let err = report(&failed).unwrap_err();
        assert_eq!(err.to_string(), "No file selected.");
    }
}
