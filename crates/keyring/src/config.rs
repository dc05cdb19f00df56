use serde::{Deserialize, Serialize};

pub const DEFAULT_VAULT_FILE: &str = "mnemonic.enc";

/// Argon2id cost for newly sealed mnemonics.
///
/// Existing blobs carry their own cost, so changing these never locks a user out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        // argon2 0.5 defaults, frozen here so a dependency bump doesn't change them.
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// File name of the sealed mnemonic, relative to the data dir.
    pub file_name: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_VAULT_FILE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    pub kdf: KdfConfig,
    pub vault: VaultConfig,
    /// Re-encrypt legacy (version 1) blobs as version 2 the first time they are unlocked.
    pub upgrade_on_read: bool,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            kdf: KdfConfig::default(),
            vault: VaultConfig::default(),
            upgrade_on_read: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_fills_defaults() -> eyre::Result<()> {
        let cfg: KeyringConfig = toml::from_str("[kdf]\niterations = 4\n")?;
        assert_eq!(cfg.kdf.iterations, 4);
        assert_eq!(cfg.kdf.memory_kib, 19 * 1024);
        assert_eq!(cfg.vault.file_name, DEFAULT_VAULT_FILE);
        assert!(cfg.upgrade_on_read);
        Ok(())
    }

    #[test]
    fn default_config_round_trips_through_toml() -> eyre::Result<()> {
        let cfg = KeyringConfig::default();
        let s = toml::to_string_pretty(&cfg)?;
        let back: KeyringConfig = toml::from_str(&s)?;
        assert_eq!(back, cfg);
        Ok(())
    }
}
