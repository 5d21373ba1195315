//! hosthoover-exec: Device session abstraction
//!
//! Provides the connector/session traits the backup engine is written against,
//! an SSH implementation for network devices, and a local executor used to
//! drive external tools (git, 7z, rar).

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use local::LocalExecutor;
pub use result::{Auth, CommandResult, ConnectionInfo};
pub use ssh::{SshConnector, SshExecutor};
pub use traits::{DeviceConnector, RemoteExecutor};
