//! Listing of running processes, used to detect which editor is open

use super::Platform;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Source of the running-process listing scanned for editors
#[async_trait]
pub trait ProcessLister: Send + Sync {
    /// Raw listing text, one process per line. Errors are reported as an
    /// empty listing by the caller.
    async fn list(&self, platform: Platform) -> std::io::Result<String>;
}

/// Lists processes with the platform's own tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessLister;

/// PowerShell query returning the executable path of every process
const WINDOWS_QUERY: &str = "Get-CimInstance -Query \"select executablepath from win32_process where executablepath is not null\" | ForEach-Object { $_.ExecutablePath }";

impl SystemProcessLister {
    fn command(platform: Platform) -> Command {
        match platform {
            Platform::MacOs => {
                let mut cmd = Command::new("ps");
                cmd.args(["x", "-o", "comm="]);
                cmd
            }
            Platform::Linux => {
                let mut cmd = Command::new("ps");
                cmd.args(["x", "--no-heading", "-o", "comm", "--sort=comm"]);
                cmd
            }
            Platform::Windows => {
                let mut cmd = Command::new("powershell");
                cmd.args(["-NoProfile", "-Command", WINDOWS_QUERY]);
                cmd
            }
        }
    }
}

#[async_trait]
impl ProcessLister for SystemProcessLister {
    async fn list(&self, platform: Platform) -> std::io::Result<String> {
        let output = Self::command(platform)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "process listing exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fixed listing, for tests and for callers that already know what runs
#[derive(Debug, Default, Clone)]
pub struct StaticProcessList(pub String);

#[async_trait]
impl ProcessLister for StaticProcessList {
    async fn list(&self, _platform: Platform) -> std::io::Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_system_listing_includes_current_process() {
        let listing = SystemProcessLister.list(Platform::Linux).await;
        // ps may be missing in minimal containers; only check when it ran
        if let Ok(listing) = listing {
            assert!(!listing.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_static_listing() {
        let lister = StaticProcessList("zsh\ncode\n".to_string());
        let listing = lister.list(Platform::Linux).await.unwrap();
        assert!(listing.contains("code"));
    }
}
