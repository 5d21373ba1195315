//! Configuration loading and merging
//!
//! Settings come from three layers: built-in defaults, an optional YAML or
//! TOML file, and command-line flags. Later layers win.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, ValueEnum};
use eyre::{Result, WrapErr, bail, eyre};
use hosthoover_archive::ArchiveFormat;
use hosthoover_core::{Backoff, DeviceType, ProbeUnavailablePolicy, RetryPolicy, RunSettings};
use hosthoover_notify::SmtpSettings;
use serde::Deserialize;

/// Delay growth between retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Reachability check before dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    #[default]
    Icmp,
    Tcp,
    None,
}

/// SMTP section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpFileConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Single recipient shorthand
    pub recipient: Option<String>,
    pub starttls: Option<bool>,
}

/// Config file contents; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub ssh_key_env: Option<String>,
    pub device_type: Option<DeviceType>,
    pub port: Option<u16>,
    pub command: Option<String>,
    pub subnet: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub timeout: Option<String>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<String>,
    pub retry_backoff: Option<BackoffKind>,
    pub probe: Option<ProbeMode>,
    pub probe_timeout: Option<String>,
    pub probe_concurrency: Option<usize>,
    pub on_probe_unavailable: Option<ProbeUnavailablePolicy>,
    pub archive_format: Option<ArchiveFormat>,
    pub archive_dir: Option<PathBuf>,
    pub no_archive: Option<bool>,
    pub git: Option<bool>,
    pub git_repo: Option<PathBuf>,
    pub smtp: Option<SmtpFileConfig>,
    pub report_json: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Load a config file; the extension picks the format
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config file {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("toml") => toml::from_str(&content)
                .wrap_err_with(|| format!("invalid TOML in {}", path.display()))?,
            Some("yaml" | "yml") | None => serde_yaml::from_str::<Option<FileConfig>>(&content)
                .wrap_err_with(|| format!("invalid YAML in {}", path.display()))?
                .unwrap_or_default(),
            Some(other) => bail!("unsupported config format .{other} ({})", path.display()),
        };
        Ok(config)
    }

    /// Load from the first default location that exists
    ///
    /// Returns the path used, if any.
    pub fn load_default() -> Result<(Self, Option<PathBuf>)> {
        if let Ok(path) = std::env::var("HOSTHOOVER_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("hosthoover.yaml"),
            PathBuf::from("hosthoover.toml"),
            PathBuf::from("/etc/hosthoover/hosthoover.yaml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("hosthoover/hosthoover.yaml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }
}

/// Command-line overrides for every file setting
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// SSH username
    #[arg(short, long)]
    pub username: Option<String>,

    /// SSH password
    #[arg(short, long, env = "HOSTHOOVER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSH private key path (must be mode 0600)
    #[arg(short = 'k', long)]
    pub ssh_key: Option<PathBuf>,

    /// Environment variable holding a base64-encoded private key
    #[arg(long)]
    pub ssh_key_env: Option<String>,

    /// Device type (cisco_ios, cisco_nxos, arista_eos, juniper_junos, ...)
    #[arg(short, long)]
    pub device_type: Option<DeviceType>,

    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// Command that prints the configuration (defaults per device type)
    #[arg(long)]
    pub command: Option<String>,

    /// Subnet to back up, e.g. 10.0.0.0/24
    #[arg(short, long)]
    pub subnet: Option<String>,

    /// Directory for configuration files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Concurrent device sessions
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// Per-attempt timeout, e.g. 30s
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Retries after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Delay before the first retry, e.g. 2s
    #[arg(long, value_parser = humantime::parse_duration)]
    pub retry_delay: Option<Duration>,

    /// Retry delay growth
    #[arg(long, value_enum)]
    pub retry_backoff: Option<BackoffKind>,

    /// Reachability probe
    #[arg(long, value_enum)]
    pub probe: Option<ProbeMode>,

    /// Probe timeout, e.g. 1s
    #[arg(long, value_parser = humantime::parse_duration)]
    pub probe_timeout: Option<Duration>,

    /// Probes in flight at once
    #[arg(long)]
    pub probe_concurrency: Option<usize>,

    /// When probes cannot be sent: assume_reachable or abort
    #[arg(long)]
    pub on_probe_unavailable: Option<ProbeUnavailablePolicy>,

    /// Archive format: zip, 7z, or rar
    #[arg(long)]
    pub archive_format: Option<ArchiveFormat>,

    /// Directory for the archive (defaults to the output directory)
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Skip archiving
    #[arg(long)]
    pub no_archive: bool,

    /// Commit backups to git
    #[arg(long)]
    pub git: bool,

    /// Git work tree (defaults to the output directory)
    #[arg(long)]
    pub git_repo: Option<PathBuf>,

    /// SMTP relay for failure notifications
    #[arg(long)]
    pub smtp_server: Option<String>,

    /// SMTP relay port
    #[arg(long)]
    pub smtp_port: Option<u16>,

    /// SMTP login
    #[arg(long)]
    pub smtp_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "HOSTHOOVER_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Notification sender address
    #[arg(long)]
    pub smtp_sender: Option<String>,

    /// Notification recipient (repeatable)
    #[arg(long = "notify", value_name = "ADDRESS")]
    pub smtp_recipients: Vec<String>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Where login credentials come from
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSource {
    Password(String),
    KeyFile(PathBuf),
    KeyEnv(String),
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthSource::Password(_) => f.write_str("Password(<redacted>)"),
            AuthSource::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            AuthSource::KeyEnv(var) => f.debug_tuple("KeyEnv").field(var).finish(),
        }
    }
}

/// Resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub username: String,
    pub auth: AuthSource,
    pub device_type: DeviceType,
    pub port: u16,
    pub command: Option<String>,
    pub subnet: String,
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub run: RunSettings,
    pub probe: ProbeMode,
    /// `None` when archiving is disabled
    pub archive: Option<(ArchiveFormat, PathBuf)>,
    /// `Some` when git commits are enabled
    pub git_repo: Option<PathBuf>,
    pub smtp: Option<SmtpSettings>,
    pub report_json: Option<PathBuf>,
    pub log_level: String,
}

fn duration(
    field: &str,
    cli: Option<Duration>,
    file: Option<&str>,
    default: Duration,
) -> Result<Duration> {
    match (cli, file) {
        (Some(value), _) => Ok(value),
        (None, Some(text)) => humantime::parse_duration(text)
            .wrap_err_with(|| format!("invalid duration for {field}: {text:?}")),
        (None, None) => Ok(default),
    }
}

impl Settings {
    /// Merge defaults, file and command line
    ///
    /// # Errors
    /// Returns error for missing credentials or malformed values
    pub fn resolve(mut file: FileConfig, cli: Overrides) -> Result<Self> {
        let defaults = RunSettings::default();
        let smtp = resolve_smtp(file.smtp.take().unwrap_or_default(), &cli)?;

        let username = cli
            .username
            .or(file.username)
            .ok_or_else(|| eyre!("username is required (--username or `username` in config)"))?;

        let auth = if let Some(password) = cli.password {
            AuthSource::Password(password)
        } else if let Some(path) = cli.ssh_key {
            AuthSource::KeyFile(path)
        } else if let Some(var) = cli.ssh_key_env {
            AuthSource::KeyEnv(var)
        } else if let Some(password) = file.password {
            AuthSource::Password(password)
        } else if let Some(path) = file.ssh_key {
            AuthSource::KeyFile(path)
        } else if let Some(var) = file.ssh_key_env {
            AuthSource::KeyEnv(var)
        } else {
            bail!("a password, ssh_key or ssh_key_env is required");
        };

        let output_dir = cli
            .output_dir
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from("backups"));

        let max_workers = cli.max_workers.or(file.max_workers).unwrap_or(15);
        if max_workers == 0 {
            bail!("max_workers must be at least 1");
        }

        let retry_delay = duration(
            "retry_delay",
            cli.retry_delay,
            file.retry_delay.as_deref(),
            Duration::from_secs(2),
        )?;
        let command_timeout = duration(
            "timeout",
            cli.timeout,
            file.timeout.as_deref(),
            defaults.command_timeout,
        )?;
        let backoff = match cli.retry_backoff.or(file.retry_backoff).unwrap_or_default() {
            BackoffKind::Fixed => Backoff::Fixed(retry_delay),
            BackoffKind::Exponential => Backoff::Exponential {
                base: retry_delay,
                max: command_timeout.max(retry_delay),
            },
        };

        let run = RunSettings {
            command_timeout,
            retry: RetryPolicy {
                max_retries: cli
                    .max_retries
                    .or(file.max_retries)
                    .unwrap_or(defaults.retry.max_retries),
                backoff,
            },
            probe_timeout: duration(
                "probe_timeout",
                cli.probe_timeout,
                file.probe_timeout.as_deref(),
                defaults.probe_timeout,
            )?,
            probe_concurrency: cli
                .probe_concurrency
                .or(file.probe_concurrency)
                .unwrap_or(defaults.probe_concurrency)
                .max(1),
            on_probe_unavailable: cli
                .on_probe_unavailable
                .or(file.on_probe_unavailable)
                .unwrap_or_default(),
        };

        let no_archive = cli.no_archive || file.no_archive.unwrap_or(false);
        let archive = (!no_archive).then(|| {
            let format = cli.archive_format.or(file.archive_format).unwrap_or_default();
            let dir = cli
                .archive_dir
                .clone()
                .or_else(|| file.archive_dir.clone())
                .unwrap_or_else(|| output_dir.clone());
            (format, dir)
        });

        let git = cli.git || file.git.unwrap_or(false) || cli.git_repo.is_some();
        let git_repo = git.then(|| {
            cli.git_repo
                .or(file.git_repo)
                .unwrap_or_else(|| output_dir.clone())
        });

        Ok(Self {
            username,
            auth,
            device_type: cli.device_type.or(file.device_type).unwrap_or_default(),
            port: cli.port.or(file.port).unwrap_or(22),
            command: cli.command.or(file.command),
            subnet: cli
                .subnet
                .or(file.subnet)
                .unwrap_or_else(|| "192.168.1.0/24".to_string()),
            output_dir,
            max_workers,
            run,
            probe: cli.probe.or(file.probe).unwrap_or_default(),
            archive,
            git_repo,
            smtp,
            report_json: cli.report_json.or(file.report_json),
            log_level: cli
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn resolve_smtp(file: SmtpFileConfig, cli: &Overrides) -> Result<Option<SmtpSettings>> {
    let Some(server) = cli.smtp_server.clone().or(file.server) else {
        return Ok(None);
    };

    let mut recipients = if cli.smtp_recipients.is_empty() {
        file.recipients
    } else {
        cli.smtp_recipients.clone()
    };
    if recipients.is_empty() {
        recipients.extend(file.recipient);
    }
    if recipients.is_empty() {
        bail!("smtp is configured but has no recipients");
    }

    let sender = cli
        .smtp_sender
        .clone()
        .or(file.sender)
        .ok_or_else(|| eyre!("smtp is configured but has no sender"))?;

    Ok(Some(SmtpSettings {
        server,
        port: cli.smtp_port.or(file.port).unwrap_or(587),
        username: cli.smtp_username.clone().or(file.username),
        password: cli.smtp_password.clone().or(file.password),
        sender,
        recipients,
        starttls: file.starttls.unwrap_or(true),
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn yaml(content: &str) -> FileConfig {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        FileConfig::load(file.path()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = Overrides {
            username: Some("backup".into()),
            password: Some("pw".into()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(FileConfig::default(), cli).unwrap();

        assert_eq!(settings.device_type, DeviceType::CiscoIos);
        assert_eq!(settings.subnet, "192.168.1.0/24");
        assert_eq!(settings.output_dir, PathBuf::from("backups"));
        assert_eq!(settings.max_workers, 15);
        assert_eq!(settings.port, 22);
        assert_eq!(settings.run.command_timeout, Duration::from_secs(30));
        assert_eq!(settings.run.retry.max_retries, 2);
        assert_eq!(settings.run.retry.backoff, Backoff::Fixed(Duration::from_secs(2)));
        assert_eq!(settings.probe, ProbeMode::Icmp);
        assert_eq!(
            settings.archive,
            Some((ArchiveFormat::Zip, PathBuf::from("backups")))
        );
        assert!(settings.git_repo.is_none());
        assert!(settings.smtp.is_none());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_yaml_file() {
        let file = yaml(
            r"
username: netops
password: from-file
device_type: arista_eos
subnet: 10.1.0.0/28
max_workers: 4
timeout: 10s
retry_backoff: exponential
retry_delay: 500ms
probe: tcp
archive_format: 7z
git: true
smtp:
  server: mail.example.net
  sender: hosthoover@example.net
  recipient: noc@example.net
",
        );
        let settings = Settings::resolve(file, Overrides::default()).unwrap();

        assert_eq!(settings.username, "netops");
        assert_eq!(settings.auth, AuthSource::Password("from-file".into()));
        assert_eq!(settings.device_type, DeviceType::AristaEos);
        assert_eq!(settings.max_workers, 4);
        assert_eq!(settings.run.command_timeout, Duration::from_secs(10));
        assert_eq!(
            settings.run.retry.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_secs(10),
            }
        );
        assert_eq!(settings.probe, ProbeMode::Tcp);
        assert_eq!(settings.archive.unwrap().0, ArchiveFormat::SevenZip);
        assert_eq!(settings.git_repo, Some(PathBuf::from("backups")));

        let smtp = settings.smtp.unwrap();
        assert_eq!(smtp.recipients, vec!["noc@example.net".to_string()]);
        assert_eq!(smtp.port, 587);
        assert!(smtp.starttls);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"username = \"netops\"\nssh_key = \"/keys/id_ed25519\"\nno_archive = true\n")
            .unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        let settings = Settings::resolve(config, Overrides::default()).unwrap();

        assert_eq!(
            settings.auth,
            AuthSource::KeyFile(PathBuf::from("/keys/id_ed25519"))
        );
        assert!(settings.archive.is_none());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = yaml("username: file-user\npassword: file-pw\nsubnet: 10.0.0.0/24\nmax_workers: 3\n");
        let cli = Overrides {
            subnet: Some("10.9.9.0/30".into()),
            max_workers: Some(8),
            ssh_key: Some(PathBuf::from("/keys/cli")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(file, cli).unwrap();

        assert_eq!(settings.username, "file-user");
        assert_eq!(settings.subnet, "10.9.9.0/30");
        assert_eq!(settings.max_workers, 8);
        assert_eq!(settings.auth, AuthSource::KeyFile(PathBuf::from("/keys/cli")));
    }

    #[test]
    fn test_missing_credentials() {
        let err = Settings::resolve(FileConfig::default(), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("username"));

        let cli = Overrides {
            username: Some("u".into()),
            ..Overrides::default()
        };
        let err = Settings::resolve(FileConfig::default(), cli).unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_invalid_values() {
        let file = yaml("username: u\npassword: p\ntimeout: soon\n");
        assert!(Settings::resolve(file, Overrides::default()).is_err());

        let file = yaml("username: u\npassword: p\nmax_workers: 0\n");
        assert!(Settings::resolve(file, Overrides::default()).is_err());

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"usernme: typo\n").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_smtp_requires_recipients() {
        let file = yaml("username: u\npassword: p\nsmtp:\n  server: mail\n  sender: a@b.c\n");
        assert!(Settings::resolve(file, Overrides::default()).is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let rendered = format!("{:?}", AuthSource::Password("hunter2".into()));
        assert!(!rendered.contains("hunter2"));
    }
}
