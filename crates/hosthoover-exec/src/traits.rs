//! Device connector and session traits

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo};

/// An open, authenticated session to one device
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute a command and read its full output, bounded by `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Close the session
    async fn close(&self) -> Result<(), ExecError>;

    /// Short name of the transport, for logs
    fn executor_type(&self) -> &'static str;
}

/// Opens sessions to devices
///
/// One implementation per device transport, selected at configuration time.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Connect and authenticate
    async fn connect(&self, info: &ConnectionInfo) -> Result<Box<dyn RemoteExecutor>, ExecError>;
}
