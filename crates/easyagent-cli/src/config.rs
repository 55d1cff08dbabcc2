use std::path::Path;
use std::path::PathBuf;

use easyagent_core::config::Config;
use easyagent_core::config::ConfigError;

use crate::cli::Args;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("easyagent").join("config.toml"))
}

pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("easyagent")
        .join("easyagent.log")
}

/// Flag values that win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub session: Option<String>,
}

impl From<&Args> for Overrides {
    fn from(args: &Args) -> Self {
        Self {
            base_url: args.base_url.clone(),
            session: args.session.clone(),
        }
    }
}

/// Resolve the effective config: explicit path, else the default file when
/// present, else built-in defaults; then environment, then flags.
pub fn resolve(args: &Args) -> Result<Config, ConfigError> {
    resolve_with(
        args.config.as_deref(),
        default_config_path(),
        |name| std::env::var(name).ok(),
        &Overrides::from(args),
    )
}

pub fn resolve_with<F>(
    explicit: Option<&Path>,
    fallback: Option<PathBuf>,
    lookup: F,
    overrides: &Overrides,
) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match explicit {
        Some(path) => Config::load(path)?,
        None => match fallback.filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Config::load(&path)?
            }
            None => Config::default(),
        },
    };
    config.apply_env_with(lookup);
    if let Some(base_url) = &overrides.base_url {
        config.server.base_url = base_url.trim().to_string();
    }
    if let Some(session) = &overrides.session {
        config.server.session_id = session.trim().to_string();
    }
    config.validate()?;
    Ok(config)
}
