use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the photomark library.
///
/// Controls batch concurrency and how the pre-write backup is handled.
///
/// # Loading
///
/// ```rust,no_run
/// use photomark::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("photomark.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.batch.chunk_size = 8;
/// config.backup.keep = true;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch dispatch settings.
    pub batch: BatchConfig,
    /// Backup snapshot settings for the transactional writer.
    pub backup: BackupConfig,
}

/// How many files a batch operation touches at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files processed concurrently per chunk. Values below 1 are treated as 1.
    pub chunk_size: usize,
}

/// The sibling snapshot taken before every write.
///
/// # Example
///
/// ```rust
/// use photomark::config::BackupConfig;
/// use std::path::Path;
///
/// let backup = BackupConfig::default();
/// assert_eq!(backup.backup_path(Path::new("/photos/a.jpg")), Path::new("/photos/a.jpg.backup"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Appended to the full file name (`photo.jpg` -> `photo.jpg.backup`).
    pub suffix: String,
    /// Grace delay before a successful write's backup is deleted.
    pub retire_delay_ms: u64,
    /// If `true`, backups are never deleted.
    pub keep: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: 3 }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            suffix: ".backup".to_string(),
            retire_delay_ms: 1000,
            keep: false,
        }
    }
}

impl BatchConfig {
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

impl BackupConfig {
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    pub fn retire_delay(&self) -> Duration {
        Duration::from_millis(self.retire_delay_ms)
    }
}

impl Config {
    /// Resolve the config file path, next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("photomark.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::debug!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
