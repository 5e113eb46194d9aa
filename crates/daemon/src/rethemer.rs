use std::{
    path::PathBuf,
    process::Command,
};

use tracing::{debug, info};

use crate::{errors::RethemeError, keyfile::KeyFile};

/// The slow, non-cancellable operation that re-renders the boot splash at an integer scale.
/// Both methods block; callers run them off the async runtime.
pub trait Rethemer: Send + Sync {
    /// Cheap query of the factor the boot splash currently uses, if it can be told.
    fn current(&self) -> Result<Option<u8>, RethemeError>;

    fn apply(&self, factor: u8) -> Result<(), RethemeError>;
}

/// Map a plymouth theme name to the scale it was rendered for.
pub fn theme_scale_factor(theme: &str) -> Option<u8> {
    match theme {
        "deepin-logo" | "deepin-ssd-logo" | "uos-ssd-logo" => Some(1),
        "deepin-hidpi-logo" | "deepin-hidpi-ssd-logo" | "uos-hidpi-ssd-logo" => Some(2),
        _ => None,
    }
}

fn theme_for_factor(factor: u8) -> Option<&'static str> {
    match factor {
        1 => Some("deepin-logo"),
        2 => Some("deepin-hidpi-logo"),
        _ => None,
    }
}

/// Rethemes plymouth by switching to the matching logo theme and rebuilding the initrd.
pub struct PlymouthRethemer {
    config_path: PathBuf,
    command: String,
}

impl PlymouthRethemer {
    pub fn new(config_path: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self { config_path: config_path.into(), command: command.into() }
    }
}

impl Rethemer for PlymouthRethemer {
    fn current(&self) -> Result<Option<u8>, RethemeError> {
        let kf = KeyFile::load(&self.config_path)?;
        Ok(kf.get("Daemon", "Theme").and_then(theme_scale_factor))
    }

    fn apply(&self, factor: u8) -> Result<(), RethemeError> {
        let theme = theme_for_factor(factor).ok_or(RethemeError::UnsupportedFactor(factor))?;
        info!("switching boot splash to {} (factor {})", theme, factor);

        let output = Command::new(&self.command)
            .arg("-R")
            .arg(theme)
            .output()
            .map_err(|source| RethemeError::Spawn { command: self.command.clone(), source })?;

        if !output.status.success() {
            debug!("{} stderr: {}", self.command, String::from_utf8_lossy(&output.stderr));
            return Err(RethemeError::ExitStatus {
                command: self.command.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}
