//! Bytecode cache driver.
//!
//! A compiled-code cache lives inside the interpreter process, so it is
//! reset by running an operator-supplied command (for example
//! `cachetool opcache:reset --fcgi=/run/php/php-fpm.sock`).

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{BackendError, BackendResult, PurgeCache};

/// Resets the bytecode cache by running a configured command.
#[derive(Debug, Clone)]
pub struct OpcacheBackend {
    command: Option<Vec<String>>,
}

impl OpcacheBackend {
    /// Create the driver from a whitespace separated command line.
    ///
    /// An empty or missing command leaves the driver unconfigured.
    pub fn new(command_line: Option<&str>) -> Self {
        let command = command_line
            .map(|line| line.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty());

        Self { command }
    }
}

#[async_trait]
impl PurgeCache for OpcacheBackend {
    async fn purge_cache(&self) -> BackendResult<()> {
        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            return Err(BackendError::not_configured(
                "Bytecode cache reset command not configured",
            ));
        };

        debug!("Running bytecode cache reset: {} {:?}", program, args);
        let output = Command::new(program).args(args).output().await?;

        if output.status.success() {
            info!("Bytecode cache reset");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(BackendError::failed(format!(
                "Bytecode cache reset failed ({})",
                output.status
            )))
        } else {
            Err(BackendError::failed(stderr.to_string()))
        }
    }
}
