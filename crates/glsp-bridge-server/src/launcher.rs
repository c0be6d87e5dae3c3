//! Launching the Java GLSP server process.

use crate::error::{ServerError, ServerResult};
use glsp_bridge_core::config::ServerConfig;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Line the server prints to stdout once it accepts connections.
pub const STARTUP_COMPLETE_MARKER: &str = "[GLSP-Server]:Startup completed";

/// Default time to wait for [`STARTUP_COMPLETE_MARKER`].
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How to start a server process.
#[derive(Debug, Clone)]
pub struct ServerLaunchOptions {
    pub jar_path: PathBuf,
    pub port: u16,
    pub java: String,
    pub additional_args: Vec<String>,
    /// Forward the server's output at info level instead of debug.
    pub logging: bool,
    pub startup_timeout: Duration,
}

impl ServerLaunchOptions {
    pub fn new(jar_path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            jar_path: jar_path.into(),
            port,
            java: "java".to_string(),
            additional_args: Vec::new(),
            logging: false,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Build launch options from configuration. Fails when no jar is set.
    pub fn from_config(config: &ServerConfig, logging: bool) -> ServerResult<Self> {
        let jar_path = config
            .jar_path
            .clone()
            .ok_or_else(|| ServerError::JarNotFound(PathBuf::new()))?;

        Ok(Self {
            jar_path,
            port: config.port(),
            java: config.java().to_string(),
            additional_args: config.additional_args.clone().unwrap_or_default(),
            logging,
            startup_timeout: config
                .startup_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STARTUP_TIMEOUT),
        })
    }

    /// Arguments passed to java.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-jar".to_string(),
            self.jar_path.display().to_string(),
            "--port".to_string(),
            self.port.to_string(),
        ];
        args.extend(self.additional_args.iter().cloned());
        args
    }
}

/// A running GLSP server. The process is killed on drop.
pub struct ServerProcess {
    child: Child,
    port: u16,
}

impl ServerProcess {
    /// Spawn the server and wait until it reports startup.
    pub async fn start(options: ServerLaunchOptions) -> ServerResult<Self> {
        if !options.jar_path.is_file() {
            return Err(ServerError::JarNotFound(options.jar_path));
        }

        let args = options.args();
        debug!(java = %options.java, args = ?args, "Starting GLSP server");

        let mut child = Command::new(&options.java)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ServerError::JavaNotFound(options.java.clone()),
                _ => ServerError::ProcessError(format!("Failed to start server: {e}")),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ServerError::ProcessError("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ServerError::ProcessError("Failed to get stderr".to_string()))?;

        let (started_tx, started_rx) = oneshot::channel();
        tokio::spawn(forward_output(stdout, options.logging, Some(started_tx)));
        tokio::spawn(forward_output(stderr, options.logging, None));

        let outcome = tokio::time::timeout(options.startup_timeout, async {
            tokio::select! {
                started = started_rx => match started {
                    Ok(()) => Startup::Ready,
                    Err(_) => Startup::OutputClosed,
                },
                status = child.wait() => Startup::Exited(status),
            }
        })
        .await;

        let status = match outcome {
            Ok(Startup::Ready) => {
                info!(port = options.port, "GLSP server started");
                return Ok(Self {
                    child,
                    port: options.port,
                });
            }
            Ok(Startup::Exited(status)) => status?,
            // stdout closed without the marker; report how the process ends.
            Ok(Startup::OutputClosed) => {
                match tokio::time::timeout(options.startup_timeout, child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        let _ = child.start_kill();
                        return Err(ServerError::Timeout);
                    }
                }
            }
            Err(_) => {
                warn!(timeout = ?options.startup_timeout, "GLSP server did not report startup");
                let _ = child.start_kill();
                return Err(ServerError::Timeout);
            }
        };

        warn!(%status, "GLSP server exited during startup");
        Err(ServerError::Exited(status.to_string()))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process and wait for it to exit.
    pub async fn stop(mut self) -> ServerResult<()> {
        debug!(port = self.port, "Stopping GLSP server");
        if let Err(e) = self.child.kill().await {
            // Already exited.
            debug!(error = %e, "Kill failed");
        }
        Ok(())
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

enum Startup {
    Ready,
    OutputClosed,
    Exited(std::io::Result<ExitStatus>),
}

/// Whether a server output line announces a completed startup.
pub fn is_startup_line(line: &str) -> bool {
    line.contains(STARTUP_COMPLETE_MARKER)
}

async fn forward_output<R>(stream: R, logging: bool, mut started: Option<oneshot::Sender<()>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if logging {
            info!(target: "glsp_server", "{}", line);
        } else {
            debug!(target: "glsp_server", "{}", line);
        }
        if is_startup_line(&line) {
            if let Some(tx) = started.take() {
                let _ = tx.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_order() {
        let mut options = ServerLaunchOptions::new("/opt/wf.jar", 5007);
        options.additional_args = vec!["--logLevel".to_string(), "DEBUG".to_string()];
        assert_eq!(
            options.args(),
            vec!["-jar", "/opt/wf.jar", "--port", "5007", "--logLevel", "DEBUG"]
        );
    }

    #[test]
    fn test_from_config_defaults() {
        let config = ServerConfig {
            jar_path: Some(PathBuf::from("/opt/wf.jar")),
            startup_timeout_secs: Some(5),
            ..Default::default()
        };
        let options = ServerLaunchOptions::from_config(&config, true).unwrap();
        assert_eq!(options.port, 5007);
        assert_eq!(options.java, "java");
        assert_eq!(options.startup_timeout, Duration::from_secs(5));
        assert!(options.logging);

        assert!(matches!(
            ServerLaunchOptions::from_config(&ServerConfig::default(), false),
            Err(ServerError::JarNotFound(_))
        ));
    }

    #[test]
    fn test_startup_line() {
        assert!(is_startup_line("[GLSP-Server]:Startup completed"));
        assert!(is_startup_line("12:00:01 INFO [GLSP-Server]:Startup completed on port 5007"));
        assert!(!is_startup_line("[GLSP-Server]:Starting"));
    }

    #[tokio::test]
    async fn test_missing_jar() {
        let dir = TempDir::new().unwrap();
        let options = ServerLaunchOptions::new(dir.path().join("missing.jar"), 5007);
        let err = ServerProcess::start(options).await.err().unwrap();
        assert!(matches!(err, ServerError::JarNotFound(_)));
        assert!(err.to_string().contains("jar path is not valid"));
    }

    #[tokio::test]
    async fn test_missing_java() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("server.jar");
        std::fs::write(&jar, b"").unwrap();

        let mut options = ServerLaunchOptions::new(jar, 5007);
        options.java = "glsp-bridge-no-such-java".to_string();
        let err = ServerProcess::start(options).await.err().unwrap();
        assert!(matches!(err, ServerError::JavaNotFound(ref java) if java == "glsp-bridge-no-such-java"));
    }

    #[cfg(unix)]
    fn fake_java(dir: &TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("fake-java");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_waits_for_startup_marker() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("server.jar");
        std::fs::write(&jar, b"").unwrap();

        let mut options = ServerLaunchOptions::new(jar, 5123);
        options.java = fake_java(
            &dir,
            "echo booting\necho '[GLSP-Server]:Startup completed'\nsleep 30",
        );
        options.startup_timeout = Duration::from_secs(10);

        let server = ServerProcess::start(options).await.unwrap();
        assert_eq!(server.port(), 5123);
        assert!(server.id().is_some());
        server.stop().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_before_startup() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("server.jar");
        std::fs::write(&jar, b"").unwrap();

        let mut options = ServerLaunchOptions::new(jar, 5007);
        options.java = fake_java(&dir, "echo 'Address already in use' >&2\nexit 3");
        options.startup_timeout = Duration::from_secs(10);

        let err = ServerProcess::start(options).await.err().unwrap();
        assert!(matches!(err, ServerError::Exited(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_startup_timeout() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("server.jar");
        std::fs::write(&jar, b"").unwrap();

        let mut options = ServerLaunchOptions::new(jar, 5007);
        options.java = fake_java(&dir, "sleep 30");
        options.startup_timeout = Duration::from_millis(200);

        let err = ServerProcess::start(options).await.err().unwrap();
        assert!(matches!(err, ServerError::Timeout));
    }
}
