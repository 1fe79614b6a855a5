use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Default external player program
pub const DEFAULT_PLAYER: &str = "mpv";

/// Something that can play an episode URL
#[async_trait]
pub trait PlaybackLauncher: Send + Sync {
    async fn launch(&self, url: &str) -> Result<()>;
}

/// Start playback in the background
///
/// The launch runs as its own task; its outcome is only logged and never
/// reaches the caller.
pub fn spawn_playback(launcher: Arc<dyn PlaybackLauncher>, url: String) {
    tokio::spawn(async move {
        match launcher.launch(&url).await {
            Ok(()) => log::info!("Playback of {} finished", url),
            Err(e) => log::warn!("Playback of {} failed: {}", url, e),
        }
    });
}

/// Launches an external player process per URL
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the player command for one URL
    pub fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    /// Check whether the player program can be found on PATH
    pub async fn is_available(&self) -> bool {
        Command::new("which")
            .arg(&self.program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl PlaybackLauncher for ProcessLauncher {
    async fn launch(&self, url: &str) -> Result<()> {
        log::info!("Launching {} {}", self.program, url);

        let status = self
            .command(url)
            .status()
            .await
            .map_err(|e| anyhow!("Failed to start {}: {}", self.program, e))?;

        if !status.success() {
            return Err(anyhow!("{} exited with {}", self.program, status));
        }

        Ok(())
    }
}
