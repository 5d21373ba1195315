//! Backup targets and device families

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use hosthoover_exec::{Auth, ConnectionInfo};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;

/// Device family, which fixes the default backup command and how the
/// device names itself in its configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Cisco IOS
    #[default]
    CiscoIos,
    /// Cisco IOS-XE
    CiscoXe,
    /// Cisco NX-OS
    CiscoNxos,
    /// Cisco ASA
    CiscoAsa,
    /// Arista EOS
    AristaEos,
    /// Juniper Junos
    JuniperJunos,
    /// Anything answering `show running-config`
    Generic,
}

impl DeviceType {
    /// Command that prints the running configuration
    #[must_use]
    pub fn backup_command(self) -> &'static str {
        match self {
            DeviceType::JuniperJunos => "show configuration | display set",
            _ => "show running-config",
        }
    }

    /// Hostname declared in a captured configuration, if any
    #[must_use]
    pub fn extract_hostname(self, config: &str) -> Option<String> {
        config.lines().map(str::trim).find_map(|line| {
            let rest = match self {
                DeviceType::JuniperJunos => line
                    .strip_prefix("set system host-name ")
                    .or_else(|| line.strip_prefix("host-name ")),
                _ => line.strip_prefix("hostname "),
            }?;
            let name = rest.trim().trim_end_matches(';').trim_matches('"');
            (!name.is_empty()).then(|| name.to_string())
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::CiscoXe => "cisco_xe",
            DeviceType::CiscoNxos => "cisco_nxos",
            DeviceType::CiscoAsa => "cisco_asa",
            DeviceType::AristaEos => "arista_eos",
            DeviceType::JuniperJunos => "juniper_junos",
            DeviceType::Generic => "generic",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cisco_ios" | "ios" => Ok(DeviceType::CiscoIos),
            "cisco_xe" | "ios_xe" => Ok(DeviceType::CiscoXe),
            "cisco_nxos" | "nxos" => Ok(DeviceType::CiscoNxos),
            "cisco_asa" | "asa" => Ok(DeviceType::CiscoAsa),
            "arista_eos" | "eos" => Ok(DeviceType::AristaEos),
            "juniper_junos" | "juniper" | "junos" => Ok(DeviceType::JuniperJunos),
            "generic" => Ok(DeviceType::Generic),
            other => Err(CoreError::ConfigError(format!("unknown device type: {other}"))),
        }
    }
}

/// Login material shared by every target of a run
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login name
    pub username: String,
    /// Password or resolved key
    pub auth: Auth,
}

impl Credentials {
    pub fn new(username: impl Into<String>, auth: Auth) -> Self {
        Self {
            username: username.into(),
            auth,
        }
    }
}

/// One device to back up. Immutable once built.
#[derive(Debug, Clone)]
pub struct Target {
    addr: IpAddr,
    port: u16,
    device_type: DeviceType,
    command: Option<String>,
    credentials: Arc<Credentials>,
}

impl Target {
    pub fn new(addr: IpAddr, device_type: DeviceType, credentials: Arc<Credentials>) -> Self {
        Self {
            addr,
            port: 22,
            device_type,
            command: None,
            credentials,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the device family's backup command
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Command executed to capture the configuration
    #[must_use]
    pub fn command(&self) -> &str {
        self.command
            .as_deref()
            .unwrap_or_else(|| self.device_type.backup_command())
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Session parameters for this target
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(
            self.addr.to_string(),
            self.credentials.username.clone(),
            self.credentials.auth.clone(),
        )
        .with_port(self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

// Credentials never leave the process.
impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Target", 4)?;
        state.serialize_field("addr", &self.addr)?;
        state.serialize_field("port", &self.port)?;
        state.serialize_field("device_type", &self.device_type)?;
        state.serialize_field("command", self.command())?;
        state.end()
    }
}

/// Shared settings stamped onto every address of a subnet
#[derive(Debug, Clone)]
pub struct TargetTemplate {
    pub device_type: DeviceType,
    pub port: u16,
    pub command: Option<String>,
    pub credentials: Arc<Credentials>,
}

impl TargetTemplate {
    pub fn new(device_type: DeviceType, credentials: Credentials) -> Self {
        Self {
            device_type,
            port: 22,
            command: None,
            credentials: Arc::new(credentials),
        }
    }

    /// Build the target for one address
    #[must_use]
    pub fn target(&self, addr: IpAddr) -> Target {
        let target = Target::new(addr, self.device_type, Arc::clone(&self.credentials))
            .with_port(self.port);
        match &self.command {
            Some(command) => target.with_command(command.clone()),
            None => target,
        }
    }

    /// Build targets for every address, keeping order
    #[must_use]
    pub fn expand(&self, addrs: &[IpAddr]) -> Vec<Target> {
        addrs.iter().map(|addr| self.target(*addr)).collect()
    }
}
