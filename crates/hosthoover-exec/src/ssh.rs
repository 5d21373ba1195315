//! SSH sessions to network devices using the russh crate

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::client::AuthResult;
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::result::{Auth, CommandResult, ConnectionInfo};
use crate::traits::{DeviceConnector, RemoteExecutor};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Fleet devices are addressed by subnet sweep, so there is no
        // known_hosts entry to verify against.
        Ok(true)
    }
}

/// One authenticated SSH session to a device
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// SSH session, `None` once closed
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self.session.try_lock().map(|s| s.is_some()).unwrap_or(false);
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("connected", &connected)
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Connect to the device and authenticate
    ///
    /// # Errors
    /// Returns `ExecError::ConnectionFailed` when the TCP/SSH handshake fails
    /// or the transport drops during authentication,
    /// `ExecError::AuthenticationFailed` or `ExecError::SshKeyError` when the
    /// credentials are rejected or unusable
    #[instrument(skip(config, conn_info), fields(host = %conn_info.host))]
    pub async fn connect(
        config: Arc<client::Config>,
        conn_info: ConnectionInfo,
    ) -> Result<Self, ExecError> {
        debug!(
            host = %conn_info.host,
            port = conn_info.port,
            user = %conn_info.user,
            "connecting to SSH"
        );

        let mut session = client::connect(
            config,
            (&conn_info.host[..], conn_info.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let auth_res = match &conn_info.auth {
            Auth::Password(password) => {
                session
                    .authenticate_password(&conn_info.user, password)
                    .await
            }
            Auth::Key(key) => {
                let key_pair = load_secret_key(key.path(), None)
                    .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                session
                    .authenticate_publickey(
                        &conn_info.user,
                        PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                    )
                    .await
            }
        };
        check_auth(&conn_info, auth_res)?;

        debug!(host = %conn_info.host, "SSH connected and authenticated");

        Ok(Self {
            conn_info,
            session: Mutex::new(Some(session)),
        })
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    /// Execute command on the device and collect everything it prints
    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;

        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(command = %cmd, "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        // Many network operating systems never send exit-status for exec
        // requests, so absence means success.
        let mut status = 0;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = exit_status.cast_signed();
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(
            command = %cmd,
            status = status,
            bytes = stdout.len(),
            duration = ?duration,
            "remote command completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(timeout_duration, self.execute_remote(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    command = %cmd,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    async fn close(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            debug!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Opens `SshExecutor` sessions with a shared client configuration
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("inactivity_timeout", &self.config.inactivity_timeout)
            .finish()
    }
}

impl SshConnector {
    /// Create a connector whose sessions drop after `inactivity_timeout` of silence
    #[must_use]
    pub fn new(inactivity_timeout: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(inactivity_timeout),
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl DeviceConnector for SshConnector {
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteExecutor>, ExecError> {
        let executor = SshExecutor::connect(Arc::clone(&self.config), info.clone()).await?;
        info!(host = %info.host, "session opened");
        Ok(Box::new(executor))
    }
}

/// Only an explicit rejection by the device is a credential failure; a
/// transport error in the middle of the exchange is a connection failure.
fn check_auth(
    conn_info: &ConnectionInfo,
    result: Result<AuthResult, russh::Error>,
) -> Result<(), ExecError> {
    match result {
        Ok(res) if res.success() => Ok(()),
        Ok(_) => Err(ExecError::AuthenticationFailed(format!(
            "{} rejected credentials for {}",
            conn_info.host, conn_info.user
        ))),
        Err(e) => Err(ExecError::ConnectionFailed(format!(
            "{} dropped during authentication: {e}",
            conn_info.host
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> ConnectionInfo {
        ConnectionInfo::new("192.0.2.1", "admin", Auth::Password("x".into()))
    }

    #[test]
    fn test_transport_error_during_auth_is_retryable() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        for err in [russh::Error::Disconnect, russh::Error::IO(reset)] {
            let err = check_auth(&device(), Err(err)).unwrap_err();
            assert!(matches!(err, ExecError::ConnectionFailed(_)), "{err:?}");
            assert!(err.is_retryable());
            assert!(!err.is_auth_failure());
        }
    }

    #[test]
    fn test_rejected_credentials_are_auth_failure() {
        let rejected = AuthResult::Failure {
            remaining_methods: russh::MethodSet::empty(),
            partial_success: false,
        };
        let err = check_auth(&device(), Ok(rejected)).unwrap_err();
        assert!(err.is_auth_failure());
        assert!(!err.is_retryable());

        assert!(check_auth(&device(), Ok(AuthResult::Success)).is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // Port 1 on loopback is closed on any sane test machine.
        let connector = SshConnector::new(Duration::from_secs(5));
        let info = ConnectionInfo::new("127.0.0.1", "admin", Auth::Password("x".into()))
            .with_port(1);

        let err = connector.connect(&info).await.err().expect("connect should fail");
        assert!(matches!(err, ExecError::ConnectionFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_exec_against_device() {
        let connector = SshConnector::default();
        let info = ConnectionInfo::new("192.0.2.10", "admin", Auth::Password("admin".into()));
        let session = connector.connect(&info).await.unwrap();
        let result = session
            .run_with_timeout("show running-config", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!result.stdout.is_empty());
        session.close().await.unwrap();
    }
}
