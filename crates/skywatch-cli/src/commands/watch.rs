//! Watch command - poll a remote file and report each change
//!
//! Builds the controller, an [`IntervalScheduler`] and a [`ChangeWatcher`],
//! then prints one line (or one JSON object) per change until:
//! - SIGINT/SIGTERM arrives (exit 0), or
//! - sign-in is declined and access is revoked (exit 1).

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use skywatch_core::domain::Fingerprint;
use skywatch_core::ports::{IAccessObserver, IRemoteFileAccess};
use skywatch_sync::{ChangeWatcher, IntervalScheduler, WatchEvent};

use super::{resolve_path, CliContext};
use crate::output::Printer;

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Backslash-delimited remote path (defaults to watch.path)
    path: Option<String>,

    /// Seconds between polls (defaults to watch.poll_interval)
    #[arg(long)]
    interval: Option<u64>,

    /// SHA-256 hex digest of content already known; no change is reported
    /// while the remote content still matches it
    #[arg(long)]
    seed: Option<String>,
}

/// Cancels a token when the controller revokes access
struct RevokeSignal {
    token: CancellationToken,
}

impl IAccessObserver for RevokeSignal {
    fn access_revoked(&self) {
        self.token.cancel();
    }
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = ctx.printer();
        let config = ctx.load_config()?;
        let path = resolve_path(self.path.as_deref(), &config)?;

        let interval = self.interval.unwrap_or(config.watch.poll_interval);
        if interval == 0 {
            anyhow::bail!("The poll interval must be greater than 0 seconds");
        }

        let seed = match &self.seed {
            Some(hex) => Some(hex.parse::<Fingerprint>().context("Invalid --seed")?),
            None => config
                .seed_fingerprint()
                .context("Invalid watch.seed_fingerprint")?,
        };

        let controller = ctx.build_controller(&config)?;
        let scheduler = Arc::new(IntervalScheduler::new(Duration::from_secs(interval)));

        let revoked = CancellationToken::new();
        let signal = Arc::new(RevokeSignal {
            token: revoked.clone(),
        });
        let observer: Weak<dyn IAccessObserver> = Arc::downgrade(&signal) as Weak<dyn IAccessObserver>;
        controller.subscribe(observer);

        let (watcher, mut events) = ChangeWatcher::new(path.clone(), controller, scheduler, seed)?;

        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));

        info!(path = %path, interval_secs = interval, "Watching remote file");
        fmt.info(&format!("Watching {path} every {interval}s (Ctrl+C to stop)"));
        watcher.start();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    watcher.stop();
                    fmt.info("Stopped");
                    return Ok(());
                }
                _ = revoked.cancelled() => {
                    watcher.stop();
                    anyhow::bail!("Sign-in was declined; access to the remote drive is revoked");
                }
                event = events.recv() => match event {
                    Some(event) => report_change(&fmt, &path, &event),
                    None => return Ok(()),
                },
            }
        }
    }
}

fn report_change(fmt: &Printer, path: &str, event: &WatchEvent) {
    let WatchEvent::Changed {
        content,
        fingerprint,
    } = event;
    let now = Utc::now();

    if fmt.is_json() {
        fmt.print_json(&serde_json::json!({
            "event": "changed",
            "path": path,
            "fingerprint": fingerprint.as_str(),
            "content": content,
            "detected_at": now.to_rfc3339(),
        }));
    } else {
        fmt.raw(&change_line(path, content, fingerprint, now));
    }
}

fn change_line(
    path: &str,
    content: &str,
    fingerprint: &Fingerprint,
    at: chrono::DateTime<Utc>,
) -> String {
    format!(
        "{} {} changed ({} bytes, {})",
        at.format("%Y-%m-%d %H:%M:%S"),
        path,
        content.len(),
        &fingerprint.as_str()[..12]
    )
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_change_line_format() {
        let fingerprint = Fingerprint::of("blabla");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 5).unwrap();

        let line = change_line(r"notes\todo.txt", "blabla", &fingerprint, at);
        assert_eq!(
            line,
            format!(
                r"2026-03-01 12:30:05 notes\todo.txt changed (6 bytes, {})",
                &fingerprint.as_str()[..12]
            )
        );
    }

    #[test]
    fn test_revoke_signal_cancels_token() {
        let token = CancellationToken::new();
        let signal = RevokeSignal {
            token: token.clone(),
        };
        signal.access_revoked();
        assert!(token.is_cancelled());
    }
}
