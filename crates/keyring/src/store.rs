use crate::{config::KeyringConfig, paths::KeyringPaths};
use eyre::Context as _;
use std::{fs, path::PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

fn parse_bool_env(v: &str) -> Option<bool> {
    match v.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides. Overrides are never written back to disk.
fn apply_env_overrides(cfg: &mut KeyringConfig) {
    fn apply_u32(var: &str, slot: &mut u32) {
        let Ok(v) = std::env::var(var) else {
            return;
        };
        match v.trim().parse::<u32>() {
            Ok(n) if n > 0 => *slot = n,
            _ => warn!(var, "ignoring invalid numeric override"),
        }
    }

    apply_u32("KEYRING_KDF_MEMORY_KIB", &mut cfg.kdf.memory_kib);
    apply_u32("KEYRING_KDF_ITERATIONS", &mut cfg.kdf.iterations);
    apply_u32("KEYRING_KDF_PARALLELISM", &mut cfg.kdf.parallelism);

    if let Ok(v) = std::env::var("KEYRING_VAULT_FILE") {
        let t = v.trim();
        if !t.is_empty() {
            t.clone_into(&mut cfg.vault.file_name);
        }
    }
    if let Ok(v) = std::env::var("KEYRING_UPGRADE_ON_READ") {
        match parse_bool_env(&v) {
            Some(b) => cfg.upgrade_on_read = b,
            None => warn!("ignoring invalid KEYRING_UPGRADE_ON_READ"),
        }
    }
}

impl ConfigStore {
    pub fn new(paths: &KeyringPaths) -> Self {
        Self {
            path: paths.config_dir.join("config.toml"),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<KeyringConfig> {
        let mut cfg = if self.path.exists() {
            let s = fs::read_to_string(&self.path).context("read config.toml")?;
            toml::from_str(&s).context("parse config.toml")?
        } else {
            let cfg = KeyringConfig::default();
            self.save(&cfg)?;
            cfg
        };
        apply_env_overrides(&mut cfg);
        Ok(cfg)
    }

    pub fn save(&self, cfg: &KeyringConfig) -> eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::fsutil::ensure_private_dir(parent)?;
        }
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_string_atomic_restrictive(
            &self.path,
            &s,
            crate::fsutil::MODE_FILE_PRIVATE,
        )
        .context("write config.toml")?;
        Ok(())
    }
}
