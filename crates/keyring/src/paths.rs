use crate::config::KeyringConfig;
use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "keyring.log.jsonl";

#[derive(Debug, Clone)]
pub struct KeyringPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl KeyringPaths {
    pub fn at(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let log_file = data_dir.join(LOG_FILE_NAME);
        Self {
            config_dir,
            data_dir,
            log_file,
        }
    }

    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knobs; both must be set.
        if let (Ok(data_dir), Ok(config_dir)) = (
            std::env::var("KEYRING_DATA_DIR"),
            std::env::var("KEYRING_CONFIG_DIR"),
        ) {
            return Ok(Self::at(PathBuf::from(config_dir), PathBuf::from(data_dir)));
        }

        // macOS: ~/Library/Application Support/keyring
        // Linux: ~/.config/keyring, ~/.local/share/keyring
        // Windows: %APPDATA%\\keyring
        let proj =
            ProjectDirs::from("", "", "keyring").context("failed to resolve project dirs")?;
        Ok(Self::at(
            proj.config_dir().to_path_buf(),
            proj.data_dir().to_path_buf(),
        ))
    }

    pub fn vault_file(&self, cfg: &KeyringConfig) -> PathBuf {
        self.data_dir.join(&cfg.vault.file_name)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.data_dir.join("keyring.lock")
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.config_dir)?;
        crate::fsutil::ensure_private_dir(&self.data_dir)?;
        Ok(())
    }
}
