use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use traffic_signals::SignalConfig;

/// Locations searched for the signal config, relative to the working directory.
/// The second entry covers running from inside `apps/<name>`.
pub const SIGNAL_TOML_PATHS: [&str; 2] = ["configs/signal.toml", "../../configs/signal.toml"];

#[derive(Debug, Clone, Deserialize)]
struct RootConfigToml {
    #[serde(default)]
    signal: Option<SignalConfig>,
}

/// First existing candidate from [`SIGNAL_TOML_PATHS`], resolved against `base`.
pub fn find_signal_toml_in(base: &Path) -> Option<PathBuf> {
    SIGNAL_TOML_PATHS
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|path| path.is_file())
}

pub fn find_signal_toml() -> Option<PathBuf> {
    find_signal_toml_in(Path::new("."))
}

/// Parse the `[signal]` table. A missing table yields the defaults.
pub fn parse_signal_config(text: &str) -> anyhow::Result<SignalConfig> {
    let root: RootConfigToml = toml::from_str(text)
        .map_err(|e| anyhow::anyhow!("Failed to parse signal.toml: {e}"))?;
    let config = root.signal.unwrap_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid [signal] config: {e}"))?;
    Ok(config)
}

pub fn load_signal_config_from(path: &Path) -> anyhow::Result<SignalConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    parse_signal_config(&text)
}

/// Load from the default search paths, falling back to built-in timings
/// when no config file exists.
pub fn load_signal_config() -> anyhow::Result<SignalConfig> {
    match find_signal_toml() {
        Some(path) => {
            log::info!("Loading signal config from {}", path.display());
            load_signal_config_from(&path)
        }
        None => {
            log::info!(
                "No signal.toml found in {:?}, using default timings",
                SIGNAL_TOML_PATHS
            );
            Ok(SignalConfig::default())
        }
    }
}
