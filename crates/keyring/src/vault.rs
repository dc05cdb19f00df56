use crate::{
    config::KeyringConfig,
    errors::VaultError,
    fsutil,
    keystore::{
        crypto::PasswordEncryptor, wordlist::Wordlist, BinaryMnemonic, DecryptedMnemonic, Keyring,
    },
    paths::KeyringPaths,
};
use eyre::Context as _;
use fs2::FileExt as _;
use secrecy::{ExposeSecret as _, SecretString};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use zeroize::{Zeroize as _, Zeroizing};

/// What to do when a legacy (version 1) blob is unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePolicy {
    Never,
    OnRead,
}

impl UpgradePolicy {
    pub const fn from_config(cfg: &KeyringConfig) -> Self {
        if cfg.upgrade_on_read {
            Self::OnRead
        } else {
            Self::Never
        }
    }
}

#[derive(Debug)]
pub struct UnlockOutcome {
    pub decrypted: DecryptedMnemonic,
    /// The file was rewritten as version 2 during this unlock.
    pub upgraded: bool,
}

/// The single file holding a wallet's sealed mnemonic string.
#[derive(Debug, Clone)]
pub struct MnemonicVault {
    path: PathBuf,
    lock_path: PathBuf,
}

impl MnemonicVault {
    pub const fn new(path: PathBuf, lock_path: PathBuf) -> Self {
        Self { path, lock_path }
    }

    pub fn open(paths: &KeyringPaths, cfg: &KeyringConfig) -> Self {
        Self::new(paths.vault_file(cfg), paths.lock_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> eyre::Result<Zeroizing<String>> {
        if !self.exists() {
            return Err(VaultError::NotFound(self.path.clone()).into());
        }
        fsutil::read_secret_string(&self.path).context("read sealed mnemonic")
    }

    pub fn store(&self, sealed: &str, overwrite: bool) -> eyre::Result<()> {
        if !overwrite && self.exists() {
            return Err(VaultError::AlreadyExists(self.path.clone()).into());
        }
        fsutil::write_string_atomic_restrictive(&self.path, sealed, fsutil::MODE_FILE_PRIVATE)
            .context("write sealed mnemonic")
    }

    /// Exclusive lock for writers across processes. Fails fast instead of blocking.
    pub fn acquire_write_lock(&self) -> eyre::Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            fsutil::ensure_private_dir(parent)?;
        }
        let mut oo = OpenOptions::new();
        oo.create(true).read(true).write(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            oo.mode(fsutil::MODE_FILE_PRIVATE);
        }
        let f = oo.open(&self.lock_path).context("open lock file")?;
        match f.try_lock_exclusive() {
            Ok(()) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(VaultError::Busy.into()),
            Err(e) => Err(eyre::Report::new(e).wrap_err("lock exclusive")),
        }
    }

    pub fn release_lock(f: File) -> eyre::Result<()> {
        fs2::FileExt::unlock(&f).context("unlock")?;
        drop(f);
        Ok(())
    }

    /// Seal `mnemonic` and write it. The buffer is zeroed either way.
    pub async fn seal_and_store<E: PasswordEncryptor, W: Wordlist>(
        &self,
        keyring: &Keyring<E, W>,
        mnemonic: &mut BinaryMnemonic,
        password: SecretString,
        overwrite: bool,
    ) -> eyre::Result<()> {
        let lock = self.acquire_write_lock()?;
        if !overwrite && self.exists() {
            mnemonic.zeroize();
            return Err(VaultError::AlreadyExists(self.path.clone()).into());
        }
        let sealed = keyring.encrypt_mnemonic(mnemonic, password).await?;
        self.store(&sealed, overwrite)?;
        Self::release_lock(lock)?;
        info!(path = %self.path.display(), "sealed mnemonic stored");
        Ok(())
    }

    /// Decrypt the stored blob. With [`UpgradePolicy::OnRead`], a legacy blob is
    /// re-sealed as version 2 under the same password.
    ///
    /// The upgrade never fails the read: if it can't run, the decrypted
    /// mnemonic is still returned with `upgraded: false`.
    pub async fn unlock<E: PasswordEncryptor, W: Wordlist>(
        &self,
        keyring: &Keyring<E, W>,
        password: SecretString,
        policy: UpgradePolicy,
    ) -> eyre::Result<UnlockOutcome> {
        let sealed = self.load()?;
        let retained = (policy == UpgradePolicy::OnRead).then(|| {
            (
                SecretString::new(password.expose_secret().into()),
                sealed.clone(),
            )
        });

        let decrypted = keyring.decrypt_mnemonic(sealed, password).await?;
        let Some((password, read)) = retained.filter(|_| decrypted.version.is_legacy()) else {
            return Ok(UnlockOutcome {
                decrypted,
                upgraded: false,
            });
        };

        let upgraded = match self
            .reseal_if_unchanged(keyring, &decrypted.mnemonic, password, &read)
            .await
        {
            Ok(upgraded) => upgraded,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "legacy upgrade skipped");
                false
            }
        };
        Ok(UnlockOutcome {
            decrypted,
            upgraded,
        })
    }

    /// Rewrite `mnemonic` as version 2, but only if the file still holds the
    /// blob it was decrypted from.
    async fn reseal_if_unchanged<E: PasswordEncryptor, W: Wordlist>(
        &self,
        keyring: &Keyring<E, W>,
        mnemonic: &BinaryMnemonic,
        password: SecretString,
        read: &str,
    ) -> eyre::Result<bool> {
        let lock = self.acquire_write_lock()?;
        if self.load()?.as_str() != read {
            Self::release_lock(lock)?;
            warn!(path = %self.path.display(), "vault changed while unlocking; legacy upgrade skipped");
            return Ok(false);
        }

        // encrypt_mnemonic zeroes what it is given; the caller still needs the original.
        let mut copy = BinaryMnemonic::from_bytes(mnemonic.as_bytes().to_vec());
        let resealed = keyring.encrypt_mnemonic(&mut copy, password).await?;
        self.store(&resealed, true)?;
        Self::release_lock(lock)?;
        info!(path = %self.path.display(), "legacy mnemonic re-sealed as version 2");
        Ok(true)
    }
}
