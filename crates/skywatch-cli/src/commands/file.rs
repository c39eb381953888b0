//! Get and put commands - one-shot access to a remote file
//!
//! Both go through the [`AccessController`](skywatch_sync::AccessController),
//! so they sign in, restore sessions and walk folders exactly as watch mode
//! does.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use skywatch_core::domain::Fingerprint;
use skywatch_core::ports::IRemoteFileAccess;

use super::{resolve_path, CliContext};

#[derive(Debug, Args)]
pub struct GetCommand {
    /// Backslash-delimited remote path (defaults to watch.path)
    path: Option<String>,
}

impl GetCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = ctx.printer();
        let config = ctx.load_config()?;
        let path = resolve_path(self.path.as_deref(), &config)?;
        let controller = ctx.build_controller(&config)?;

        info!(path = %path, "Reading remote file");
        let content = controller.get_file(&path).await?;

        if controller.is_revoked() {
            anyhow::bail!("Sign-in was declined; access to the remote drive is revoked");
        }

        match content {
            Some(content) => {
                if ctx.is_json() {
                    fmt.print_json(&serde_json::json!({
                        "path": path,
                        "found": true,
                        "fingerprint": Fingerprint::of(&content).as_str(),
                        "content": content,
                    }));
                } else {
                    fmt.raw(&content);
                }
            }
            None => {
                if ctx.is_json() {
                    fmt.print_json(&serde_json::json!({ "path": path, "found": false }));
                } else {
                    fmt.warn(&format!("{path} not found"));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PutCommand {
    /// Backslash-delimited remote path (defaults to watch.path)
    path: Option<String>,

    /// Text to write
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    content: Option<String>,

    /// Local file whose text is written
    #[arg(long)]
    file: Option<PathBuf>,
}

impl PutCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = ctx.printer();
        let config = ctx.load_config()?;
        let path = resolve_path(self.path.as_deref(), &config)?;
        let content = self.read_content().await?;
        let controller = ctx.build_controller(&config)?;

        info!(path = %path, size = content.len(), "Writing remote file");
        controller.save_file(&path, &content).await?;

        if controller.is_revoked() {
            anyhow::bail!("Sign-in was declined; access to the remote drive is revoked");
        }

        if ctx.is_json() {
            fmt.print_json(&serde_json::json!({
                "path": path,
                "saved": true,
                "fingerprint": Fingerprint::of(&content).as_str(),
            }));
        } else {
            fmt.success(&format!("Saved {path} ({} bytes)", content.len()));
        }

        Ok(())
    }

    async fn read_content(&self) -> Result<String> {
        match (&self.content, &self.file) {
            (Some(content), _) => Ok(content.clone()),
            (None, Some(file)) => tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display())),
            (None, None) => anyhow::bail!("Either --content or --file is required"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_put_reads_content_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "blabla").unwrap();

        let cmd = PutCommand {
            path: Some("a.txt".to_string()),
            content: None,
            file: Some(file.path().to_path_buf()),
        };
        assert_eq!(cmd.read_content().await.unwrap(), "blabla");
    }

    #[tokio::test]
    async fn test_put_prefers_inline_content() {
        let cmd = PutCommand {
            path: None,
            content: Some("inline".to_string()),
            file: None,
        };
        assert_eq!(cmd.read_content().await.unwrap(), "inline");
    }

    #[tokio::test]
    async fn test_put_missing_file_fails() {
        let cmd = PutCommand {
            path: None,
            content: None,
            file: Some(PathBuf::from("/nonexistent/skywatch/input.txt")),
        };
        assert!(cmd.read_content().await.is_err());
    }
}
