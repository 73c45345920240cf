/// mpv process supervisor.
///
/// Launches one headless mpv with a control socket, waits for the socket to
/// accept connections, and tears the process down on `quit`: first politely
/// over the socket, then with a kill if mpv does not go away.
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use radion_proto::config::Config;
use radion_proto::platform;
use radion_proto::protocol::EngineCommand;
use tracing::{debug, info, warn, Instrument, Span};

use crate::ipc::IpcClient;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "'{binary}' was not found in $PATH\n\
         Please install 'mpv' using your package manager or visit https://mpv.io for more info."
    )]
    NotFound { binary: String },
    #[error(
        "'{path}' does not exist\n\
         Fix the [engine] binary setting, or install 'mpv' and leave it unset."
    )]
    Missing { path: String },
    #[error("failed to launch mpv: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("mpv exited during startup ({0})")]
    Exited(ExitStatus),
    #[error("mpv failed to start: control socket not reachable after {attempts} attempts")]
    NotReady { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Explicit executable; `None` searches beside the exe and on `PATH`.
    pub binary: Option<PathBuf>,
    pub socket_address: String,
    pub initial_volume: u8,
    pub ready_attempts: u32,
    pub ready_backoff: Duration,
    pub quit_timeout: Duration,
}

impl EngineOptions {
    pub fn from_config(config: &Config, socket_address: String) -> Self {
        Self {
            binary: config.engine.binary.clone(),
            socket_address,
            initial_volume: config.player.initial_volume(),
            ready_attempts: config.engine.ready_attempts,
            ready_backoff: config.engine.ready_backoff(),
            quit_timeout: config.engine.quit_timeout(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "--no-video".to_string(),
            "--idle=yes".to_string(),
            "--quiet".to_string(),
            format!("--volume={}", self.initial_volume.min(100)),
            platform::mpv_socket_arg(&self.socket_address),
        ]
    }
}

/// Owns the mpv child process.  Created once at startup, quit once at exit.
pub struct Engine {
    opts: EngineOptions,
    ipc: IpcClient,
    process: Option<tokio::process::Child>,
    span: Span,
}

impl Engine {
    pub fn new(opts: EngineOptions, ipc: IpcClient, span: Span) -> Self {
        Self {
            opts,
            ipc,
            process: None,
            span,
        }
    }

    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => child.try_wait().ok().flatten().is_none(),
            None => false,
        }
    }

    /// Launch mpv and wait until its control socket is reachable.
    ///
    /// Both failure modes are fatal for the caller: nothing plays without
    /// the engine.  On error no child process is left behind.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        let span = self.span.clone();
        async {
            self.spawn().await?;
            if let Err(e) = self.wait_ready().await {
                self.kill().await;
                return Err(e);
            }
            Ok::<_, EngineError>(())
        }
        .instrument(span)
        .await
    }

    /// Ask mpv to quit; kill it if the request cannot be delivered or mpv
    /// is still alive after `quit_timeout`.
    pub async fn quit(&mut self) {
        let span = self.span.clone();
        async {
            info!("engine: quitting mpv");
            let delivered = self.ipc.send(&EngineCommand::Quit).await;
            let Some(child) = self.process.as_mut() else {
                return;
            };

            if delivered {
                match tokio::time::timeout(self.opts.quit_timeout, child.wait()).await {
                    Ok(Ok(status)) => {
                        debug!("engine: mpv exited with {}", status);
                        self.process = None;
                        self.remove_socket().await;
                        return;
                    }
                    Ok(Err(e)) => warn!("engine: waiting for mpv failed: {}", e),
                    Err(_) => warn!(
                        "engine: mpv still running {:?} after quit",
                        self.opts.quit_timeout
                    ),
                }
            } else {
                warn!("engine: mpv failed to quit via socket");
            }
            self.kill().await;
        }
        .instrument(span)
        .await
    }

    async fn spawn(&mut self) -> Result<(), EngineError> {
        let binary = self.resolve_binary()?;
        self.remove_socket().await;

        info!("engine: spawning {:?}", binary);
        let child = tokio::process::Command::new(&binary)
            .args(self.opts.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound if self.opts.binary.is_some() => {
                    EngineError::Missing {
                        path: binary.display().to_string(),
                    }
                }
                std::io::ErrorKind::NotFound => EngineError::NotFound {
                    binary: binary.display().to_string(),
                },
                _ => EngineError::Spawn(e),
            })?;
        self.process = Some(child);
        Ok(())
    }

    fn resolve_binary(&self) -> Result<PathBuf, EngineError> {
        match &self.opts.binary {
            Some(path) => Ok(path.clone()),
            None => platform::find_mpv_binary().ok_or_else(|| EngineError::NotFound {
                binary: platform::mpv_binary_name().to_string(),
            }),
        }
    }

    async fn wait_ready(&mut self) -> Result<(), EngineError> {
        let attempts = self.opts.ready_attempts;
        let mut delay = self.opts.ready_backoff;
        for attempt in 1..=attempts {
            if self.ipc.probe().await {
                info!("engine: mpv is ready (attempt {})", attempt);
                return Ok(());
            }
            if let Some(status) = self.exit_status() {
                return Err(EngineError::Exited(status));
            }
            if attempt == attempts {
                break;
            }
            debug!("engine: waiting for mpv +{} ms", delay.as_millis());
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
        Err(EngineError::NotReady { attempts })
    }

    fn exit_status(&mut self) -> Option<ExitStatus> {
        self.process.as_mut()?.try_wait().ok().flatten()
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.process.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!("engine: mpv already exited ({})", status),
                _ => {
                    warn!("engine: killing mpv");
                    if let Err(e) = child.kill().await {
                        warn!("engine: failed to kill mpv: {}", e);
                    }
                }
            }
        }
        self.remove_socket().await;
    }

    #[cfg(unix)]
    async fn remove_socket(&self) {
        let _ = tokio::fs::remove_file(&self.opts.socket_address).await;
    }

    #[cfg(windows)]
    async fn remove_socket(&self) {}
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(child) = self.process.as_mut() {
            let _ = child.start_kill();
        }
    }
}
