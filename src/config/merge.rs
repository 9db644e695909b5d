//! MergeService: loads the optional config file and lays command-line flags over it.

use super::loader::{detect_format, load_config_file, ConfigFormat};
use super::Settings;
use crate::error::RunnerError;
use crate::flags::{ParsedFlags, CONFIG_FLAG};
use std::path::Path;
use tracing::{debug, warn};

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Build the store for one run.
    ///
    /// Precedence: flag defaults (lowest) -> config file -> flags given on the
    /// command line (highest).
    pub fn build(parsed: &ParsedFlags) -> Result<Settings, RunnerError> {
        let config_path = parsed.string(CONFIG_FLAG);
        debug!("config file path :{}", config_path);

        let mut settings = if config_path.is_empty() {
            Settings::new()
        } else {
            Self::load_file(Path::new(config_path))?
        };

        apply_flags(&mut settings, parsed);
        Ok(settings)
    }

    fn load_file(path: &Path) -> Result<Settings, RunnerError> {
        match detect_format(path) {
            Some(ConfigFormat::Json) => load_config_file(path),
            None => {
                warn!("can't load config file :{}", path.display());
                Ok(Settings::new())
            }
        }
    }
}

/// Write resolved flags into `settings` under their fully-qualified names.
///
/// Flags given on the command line always overwrite. Defaults only fill keys
/// the store does not already hold.
pub fn apply_flags(settings: &mut Settings, parsed: &ParsedFlags) {
    for flag in &parsed.flags {
        if flag.explicit || !settings.contains(&flag.full_name) {
            settings.set(flag.full_name.clone(), flag.value.to_json());
        }
    }
}
