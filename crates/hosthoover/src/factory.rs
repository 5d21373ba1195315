//! Builds run components from resolved settings

use std::sync::Arc;

use eyre::{Result, WrapErr};
use hosthoover_archive::codec_for;
use hosthoover_core::{
    ArchiveStage, CommitStage, Credentials, IcmpProber, NotifyStage, PostProcessor, Prober,
    TargetTemplate, TcpProber,
};
use hosthoover_exec::{Auth, DeviceConnector, KeySource, SshConnector};
use hosthoover_notify::SmtpNotifier;
use hosthoover_vcs::GitCommitter;
use tracing::{info, warn};

use crate::config::{AuthSource, ProbeMode, Settings};

/// Resolve credentials once for the whole run
///
/// # Errors
/// Returns error if the key cannot be found, read or decoded
pub fn credentials(settings: &Settings) -> Result<Credentials> {
    let auth = match &settings.auth {
        AuthSource::Password(password) => Auth::Password(password.clone()),
        AuthSource::KeyFile(path) => {
            let key = KeySource::Path(path.clone())
                .resolve()
                .wrap_err("cannot use SSH key")?;
            Auth::Key(Arc::new(key))
        }
        AuthSource::KeyEnv(var) => {
            let key = KeySource::Env(var.clone())
                .resolve()
                .wrap_err("cannot use SSH key from environment")?;
            Auth::Key(Arc::new(key))
        }
    };
    Ok(Credentials::new(settings.username.clone(), auth))
}

/// Shared shape of every target in the subnet
///
/// # Errors
/// Returns error if credentials cannot be resolved
pub fn target_template(settings: &Settings) -> Result<TargetTemplate> {
    let mut template = TargetTemplate::new(settings.device_type, credentials(settings)?);
    template.port = settings.port;
    template.command = settings.command.clone();
    Ok(template)
}

/// SSH connector; idle sessions are dropped after twice the attempt timeout
pub fn connector(settings: &Settings) -> Arc<dyn DeviceConnector> {
    Arc::new(SshConnector::new(settings.run.command_timeout * 2))
}

pub fn prober(settings: &Settings) -> Option<Arc<dyn Prober>> {
    match settings.probe {
        ProbeMode::Icmp => Some(Arc::new(IcmpProber::new())),
        ProbeMode::Tcp => Some(Arc::new(TcpProber::new(settings.port))),
        ProbeMode::None => None,
    }
}

/// Post-run stages enabled by the settings
///
/// # Errors
/// Returns error if the SMTP relay cannot be configured
pub async fn post_processor(settings: &Settings) -> Result<PostProcessor> {
    let mut post = PostProcessor::new();

    if let Some((format, dir)) = &settings.archive {
        post = post.with_archive(ArchiveStage::new(codec_for(*format), dir.clone()));
    }

    if let Some(repo) = &settings.git_repo {
        let committer = GitCommitter::new(repo.clone());
        if let Err(e) = committer.ensure_repository().await {
            warn!(repo = %repo.display(), error = %e, "git repository not usable, commits will fail");
        }
        post = post.with_commit(CommitStage::new(Arc::new(committer)));
    }

    if let Some(smtp) = &settings.smtp {
        let notifier = SmtpNotifier::new(smtp).wrap_err("invalid SMTP settings")?;
        info!(server = %smtp.server, recipients = smtp.recipients.len(), "failure notifications enabled");
        post = post.with_notifier(NotifyStage::new(Arc::new(notifier), smtp.recipients.clone()));
    }

    Ok(post)
}
