pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod scrub;
pub mod wordlist;

pub use codec::BinaryMnemonic;
pub use envelope::EnvelopeVersion;

use crate::errors::KeyringError;
use codec::{binary_to_word_sequence, word_sequence_to_binary};
use crypto::PasswordEncryptor;
use envelope::{CurrentEnvelope, Envelope};
use scrub::ScrubOnExit;
use secrecy::SecretString;
use tracing::{debug, warn};
use wordlist::{Bip39English, Wordlist};
use zeroize::Zeroizing;

#[derive(Debug)]
pub struct DecryptedMnemonic {
    pub mnemonic: BinaryMnemonic,
    /// Version the blob was sealed with. Callers decide whether a legacy blob
    /// gets re-encrypted.
    pub version: EnvelopeVersion,
}

/// Encrypts and decrypts a wallet mnemonic through a password-based
/// encryptor, interpreting it against an injected wordlist.
///
/// Holds no mutable state; concurrent calls are independent.
#[derive(Debug, Clone)]
pub struct Keyring<E, W = Bip39English> {
    encryptor: E,
    wordlist: W,
}

impl<E: PasswordEncryptor> Keyring<E> {
    pub const fn new(encryptor: E) -> Self {
        Self::with_wordlist(encryptor, Bip39English)
    }
}

impl<E: PasswordEncryptor, W: Wordlist> Keyring<E, W> {
    pub const fn with_wordlist(encryptor: E, wordlist: W) -> Self {
        Self {
            encryptor,
            wordlist,
        }
    }

    #[cfg(test)]
    pub(crate) const fn encryptor(&self) -> &E {
        &self.encryptor
    }

    pub fn mnemonic_from_words(&self, phrase: &str) -> Result<BinaryMnemonic, KeyringError> {
        word_sequence_to_binary(&self.wordlist, phrase)
    }

    /// Materializes the phrase as a string. Only for display or backup.
    pub fn dangerously_convert_to_words(
        &self,
        mnemonic: &BinaryMnemonic,
    ) -> Result<Zeroizing<String>, KeyringError> {
        binary_to_word_sequence(&self.wordlist, mnemonic)
    }

    /// Seal `mnemonic` as a version 2 envelope.
    ///
    /// The buffer is zeroed in place and the password dropped before this
    /// returns, on success and on every error.
    pub async fn encrypt_mnemonic(
        &self,
        mnemonic: &mut BinaryMnemonic,
        password: SecretString,
    ) -> Result<String, KeyringError> {
        let mnemonic = ScrubOnExit::new(mnemonic);
        if !self.wordlist.is_valid(&mnemonic) {
            return Err(KeyringError::InvalidMnemonic);
        }

        let sealed = self
            .encryptor
            .encrypt(&password, &CurrentEnvelope::new(&mnemonic))
            .await
            .map_err(|e| KeyringError::EncryptionFailed(e.into()));
        drop(password);
        drop(mnemonic);

        let sealed = sealed?;
        debug!(len = sealed.len(), "mnemonic encrypted");
        Ok(sealed)
    }

    /// Open a blob sealed by [`Self::encrypt_mnemonic`] or by the legacy
    /// string format.
    ///
    /// Password and ciphertext are dropped (and zeroized) before this returns.
    pub async fn decrypt_mnemonic(
        &self,
        encrypted: Zeroizing<String>,
        password: SecretString,
    ) -> Result<DecryptedMnemonic, KeyringError> {
        let payload = self.encryptor.decrypt(&password, &encrypted).await;
        drop(password);
        drop(encrypted);
        let payload = payload.map_err(|e| KeyringError::DecryptionFailed(e.into()))?;

        let envelope = Envelope::from_payload(payload)?;
        debug!(version = envelope.version().as_u8(), "envelope decoded");
        match envelope {
            Envelope::Legacy(phrase) => {
                warn!(
                    version = EnvelopeVersion::Legacy.as_u8(),
                    "mnemonic was sealed as a string and leaked to memory while decrypting; re-encrypt it"
                );
                let mnemonic = word_sequence_to_binary(&self.wordlist, &phrase)?;
                Ok(DecryptedMnemonic {
                    mnemonic,
                    version: EnvelopeVersion::Legacy,
                })
            }
            Envelope::Current(mnemonic) => Ok(DecryptedMnemonic {
                mnemonic,
                version: EnvelopeVersion::Current,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::crypto::{cheap_kdf, Argon2AesGcm};
    use eyre::ContextCompat as _;
    use serde::Serialize;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const TWELVE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const LEGAL: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";
    const TWENTY_FOUR: &str = "letter advice cage absurd amount doctor acoustic avoid letter advice cage absurd amount doctor acoustic avoid letter advice cage absurd amount doctor acoustic bless";

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_owned().into())
    }

    fn keyring() -> eyre::Result<Keyring<Argon2AesGcm>> {
        Ok(Keyring::new(Argon2AesGcm::new(cheap_kdf())?))
    }

    #[derive(Clone)]
    struct CountingEncryptor {
        inner: Argon2AesGcm,
        encrypts: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PasswordEncryptor for CountingEncryptor {
        async fn encrypt<P: Serialize + Sync>(
            &self,
            password: &SecretString,
            payload: &P,
        ) -> eyre::Result<String> {
            self.encrypts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                eyre::bail!("primitive unavailable");
            }
            self.inner.encrypt(password, payload).await
        }

        async fn decrypt(
            &self,
            password: &SecretString,
            ciphertext: &str,
        ) -> eyre::Result<serde_json::Value> {
            self.inner.decrypt(password, ciphertext).await
        }
    }

    fn counting(fail: bool) -> eyre::Result<(Keyring<CountingEncryptor>, Arc<AtomicUsize>)> {
        let encrypts = Arc::new(AtomicUsize::new(0));
        let enc = CountingEncryptor {
            inner: Argon2AesGcm::new(cheap_kdf())?,
            encrypts: Arc::clone(&encrypts),
            fail,
        };
        Ok((Keyring::new(enc), encrypts))
    }

    /// Accepts any whole number of indices; shows the checksum rule is injected.
    struct AnyLengthEnglish;

    impl Wordlist for AnyLengthEnglish {
        fn lookup_index(&self, word: &str) -> Option<u16> {
            Bip39English.lookup_index(word)
        }

        fn lookup_word(&self, index: u16) -> Option<&str> {
            Bip39English.lookup_word(index)
        }

        fn is_valid(&self, mnemonic: &BinaryMnemonic) -> bool {
            mnemonic.indices().is_ok_and(|i| !i.is_empty())
        }
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_yields_version_two() -> eyre::Result<()> {
        let kr = keyring()?;
        for phrase in [TWELVE, LEGAL, TWENTY_FOUR] {
            let mut bin = kr.mnemonic_from_words(phrase)?;
            let ct = kr.encrypt_mnemonic(&mut bin, secret("hunter2")).await?;
            let out = kr
                .decrypt_mnemonic(Zeroizing::new(ct), secret("hunter2"))
                .await?;
            assert_eq!(out.version, EnvelopeVersion::Current);
            assert_eq!(out.mnemonic, kr.mnemonic_from_words(phrase)?);
            let words = kr.dangerously_convert_to_words(&out.mnemonic)?;
            assert_eq!(words.as_str(), phrase);
        }
        Ok(())
    }

    #[tokio::test]
    async fn caller_buffer_is_zeroed_after_success() -> eyre::Result<()> {
        let kr = keyring()?;
        let mut bin = kr.mnemonic_from_words(TWELVE)?;
        kr.encrypt_mnemonic(&mut bin, secret("pw")).await?;
        assert_eq!(bin.len(), 24);
        assert!(bin.as_bytes().iter().all(|b| *b == 0));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_mnemonic_is_refused_before_the_encryptor_runs() -> eyre::Result<()> {
        let (kr, encrypts) = counting(false)?;
        // 24 x "abandon" fails the checksum.
        let mut bin = BinaryMnemonic::from_indices(&[0_u16; 24]);
        let err = kr
            .encrypt_mnemonic(&mut bin, secret("pw"))
            .await
            .err()
            .context("must refuse")?;
        assert!(matches!(err, KeyringError::InvalidMnemonic));
        assert_eq!(encrypts.load(Ordering::SeqCst), 0);
        assert!(bin.as_bytes().iter().all(|b| *b == 0));
        Ok(())
    }

    #[tokio::test]
    async fn encryptor_failure_still_zeroes_the_buffer() -> eyre::Result<()> {
        let (kr, encrypts) = counting(true)?;
        let mut bin = kr.mnemonic_from_words(LEGAL)?;
        let err = kr
            .encrypt_mnemonic(&mut bin, secret("pw"))
            .await
            .err()
            .context("must fail")?;
        assert!(matches!(err, KeyringError::EncryptionFailed(_)));
        assert_eq!(encrypts.load(Ordering::SeqCst), 1);
        assert!(bin.as_bytes().iter().all(|b| *b == 0));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_is_a_retryable_decryption_failure() -> eyre::Result<()> {
        let kr = keyring()?;
        let mut bin = kr.mnemonic_from_words(TWELVE)?;
        let ct = kr.encrypt_mnemonic(&mut bin, secret("right")).await?;
        let err = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("wrong"))
            .await
            .err()
            .context("must fail")?;
        assert!(matches!(err, KeyringError::DecryptionFailed(_)));
        assert!(err.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn garbage_ciphertext_is_a_decryption_failure() -> eyre::Result<()> {
        let kr = keyring()?;
        let err = kr
            .decrypt_mnemonic(Zeroizing::new("not a sealed box".to_owned()), secret("pw"))
            .await
            .err()
            .context("must fail")?;
        assert!(matches!(err, KeyringError::DecryptionFailed(_)));
        Ok(())
    }

    #[tokio::test]
    async fn legacy_string_envelope_decrypts_as_version_one() -> eyre::Result<()> {
        let kr = keyring()?;
        let legacy = json!({"version": 1, "mnemonic": TWELVE});
        let ct = kr.encryptor().encrypt(&secret("pw"), &legacy).await?;

        let out = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("pw"))
            .await?;
        assert_eq!(out.version, EnvelopeVersion::Legacy);
        assert!(out.version.is_legacy());
        assert_eq!(out.mnemonic, kr.mnemonic_from_words(TWELVE)?);
        Ok(())
    }

    #[tokio::test]
    async fn legacy_envelope_with_unknown_word_is_rejected() -> eyre::Result<()> {
        let kr = keyring()?;
        let legacy = json!({"version": 1, "mnemonic": "abandon notaword about"});
        let ct = kr.encryptor().encrypt(&secret("pw"), &legacy).await?;
        let err = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("pw"))
            .await
            .err()
            .context("must fail")?;
        assert!(matches!(err, KeyringError::InvalidWord { position: 1 }));
        Ok(())
    }

    #[tokio::test]
    async fn version_two_written_as_array_is_accepted() -> eyre::Result<()> {
        let kr = keyring()?;
        let bin = kr.mnemonic_from_words(LEGAL)?;
        let payload = json!({"version": 2, "mnemonic": bin.as_bytes()});
        let ct = kr.encryptor().encrypt(&secret("pw"), &payload).await?;
        let out = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("pw"))
            .await?;
        assert_eq!(out.mnemonic, bin);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_envelope_version_is_invalid() -> eyre::Result<()> {
        let kr = keyring()?;
        let payload = json!({"version": 3, "mnemonic": {"0": 0, "1": 0}});
        let ct = kr.encryptor().encrypt(&secret("pw"), &payload).await?;
        let err = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("pw"))
            .await
            .err()
            .context("must fail")?;
        assert!(matches!(err, KeyringError::InvalidEnvelope(_)));
        assert!(!err.is_retryable());
        Ok(())
    }

    #[tokio::test]
    async fn wordlist_rules_are_injected() -> eyre::Result<()> {
        let kr = Keyring::with_wordlist(Argon2AesGcm::new(cheap_kdf())?, AnyLengthEnglish);
        // Three words: no BIP-39 checksum, but this wordlist accepts it.
        let mut bin = kr.mnemonic_from_words("zoo zoo zoo")?;
        let ct = kr.encrypt_mnemonic(&mut bin, secret("pw")).await?;
        let out = kr
            .decrypt_mnemonic(Zeroizing::new(ct), secret("pw"))
            .await?;
        assert_eq!(
            kr.dangerously_convert_to_words(&out.mnemonic)?.as_str(),
            "zoo zoo zoo"
        );
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_calls_are_independent() -> eyre::Result<()> {
        let kr = keyring()?;
        let mut a = kr.mnemonic_from_words(TWELVE)?;
        let mut b = kr.mnemonic_from_words(LEGAL)?;
        let (ca, cb) = tokio::join!(
            kr.encrypt_mnemonic(&mut a, secret("a")),
            kr.encrypt_mnemonic(&mut b, secret("b")),
        );
        let (da, db) = tokio::join!(
            kr.decrypt_mnemonic(Zeroizing::new(ca?), secret("a")),
            kr.decrypt_mnemonic(Zeroizing::new(cb?), secret("b")),
        );
        assert_eq!(da?.mnemonic, kr.mnemonic_from_words(TWELVE)?);
        assert_eq!(db?.mnemonic, kr.mnemonic_from_words(LEGAL)?);
        Ok(())
    }
}
