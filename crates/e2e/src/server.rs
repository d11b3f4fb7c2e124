//! Storefront management - spawning or attaching to the app under test

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to the storefront the browser navigates to
pub struct AppServer {
    child: Option<Child>,
    pub base_url: String,
}

impl AppServer {
    /// Spawn the storefront (if a command is configured) and wait until it answers
    pub async fn start(config: AppServerConfig) -> E2eResult<Self> {
        let child = match &config.command {
            Some(command) => Some(Self::spawn(&config, command)?),
            None => {
                info!("Attaching to storefront at {}", config.base_url);
                None
            }
        };

        let server = AppServer {
            child,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        };

        server.wait_for_healthy(&config).await?;

        info!("Storefront is up at {}", server.base_url);
        Ok(server)
    }

    fn spawn(config: &AppServerConfig, command: &str) -> E2eResult<Child> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| E2eError::ServerStartup("empty app command".to_string()))?;

        info!("Spawning storefront: {} (in {})", command, config.working_dir.display());

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .current_dir(&config.working_dir)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn '{}': {}", command, e))
        })
    }

    /// Wait for the storefront to respond
    async fn wait_for_healthy(&self, config: &AppServerConfig) -> E2eResult<()> {
        let health_url = format!("{}{}", self.base_url, config.health_path);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < config.startup_timeout {
            attempts += 1;

            match client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for storefront to start...");
                    }
                    // Connection refused is expected while the dev server boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Get the base URL for this storefront
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the storefront if this handle spawned it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("Stopping storefront (pid: {})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        // Force kill if still running
        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Configuration for the storefront under test
#[derive(Debug, Clone)]
pub struct AppServerConfig {
    /// URL the browser navigates to
    pub base_url: String,

    /// Command that starts the storefront (None = attach to a running one)
    pub command: Option<String>,

    /// Directory the command runs in (the storefront checkout)
    pub working_dir: PathBuf,

    /// Extra environment for the command
    pub env: Vec<(String, String)>,

    /// Path polled until it answers 2xx
    pub health_path: String,

    /// Timeout for startup
    pub startup_timeout: Duration,
}

impl Default for AppServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            command: None,
            working_dir: PathBuf::from("."),
            env: Vec::new(),
            health_path: "/".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}
