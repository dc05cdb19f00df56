use crate::config::KdfConfig;
use aes_gcm::{
    aead::{Aead as _, KeyInit as _},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use eyre::Context as _;
use hkdf::Hkdf;
use rand::Rng as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::future::Future;
use zeroize::Zeroizing;

const SEALED_BOX_VERSION: u8 = 1;
const KDF_ALG: &str = "argon2id";
const AES_KEY_INFO: &[u8] = b"keyring:mnemonic:aes-256-gcm";

// Upper bounds for KDF costs read back from a blob; anything above is refused
// rather than allocated.
const MAX_MEMORY_KIB: u32 = 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 16;

/// Password-based authenticated encryption of a JSON payload into a printable
/// string, and back.
///
/// Tampering and a wrong password both surface as a `decrypt` error.
pub trait PasswordEncryptor: Send + Sync {
    fn encrypt<P: Serialize + Sync>(
        &self,
        password: &SecretString,
        payload: &P,
    ) -> impl Future<Output = eyre::Result<String>> + Send;

    fn decrypt(
        &self,
        password: &SecretString,
        ciphertext: &str,
    ) -> impl Future<Output = eyre::Result<serde_json::Value>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub alg: String,
    pub m_kib: u32,
    pub t: u32,
    pub p: u32,
    pub salt_b64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBox {
    pub v: u8,
    pub kdf: KdfParams,
    pub nonce_b64: String,
    pub ct_b64: String,
}

pub fn fill_random(buf: &mut [u8]) {
    let mut rng = rand::rng();
    rng.fill_bytes(buf);
}

fn argon2_params(m_kib: u32, t: u32, p: u32) -> eyre::Result<Params> {
    Params::new(m_kib, t, p, Some(32)).map_err(|e| eyre::eyre!("argon2 params: {e}"))
}

fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: Params,
) -> eyre::Result<Zeroizing<[u8; 32]>> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut master = Zeroizing::new([0_u8; 32]);
    argon2
        .hash_password_into(password, salt, master.as_mut_slice())
        .map_err(|e| eyre::eyre!("argon2 hash: {e}"))?;

    let hk = Hkdf::<Sha256>::new(None, master.as_slice());
    let mut key = Zeroizing::new([0_u8; 32]);
    hk.expand(AES_KEY_INFO, key.as_mut_slice())
        .map_err(|e| eyre::eyre!("hkdf expand: {e}"))?;
    Ok(key)
}

pub fn seal(kdf: &KdfConfig, password: &[u8], plaintext: &[u8]) -> eyre::Result<SealedBox> {
    let params = argon2_params(kdf.memory_kib, kdf.iterations, kdf.parallelism)?;
    let mut salt = [0_u8; 16];
    fill_random(&mut salt);
    let key = derive_key(password, &salt, params)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).context("aes init")?;
    let mut nonce = [0_u8; 12];
    fill_random(&mut nonce);
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| eyre::eyre!("aes encrypt: {e}"))?;

    let b64 = base64::engine::general_purpose::STANDARD;
    Ok(SealedBox {
        v: SEALED_BOX_VERSION,
        kdf: KdfParams {
            alg: KDF_ALG.to_owned(),
            m_kib: kdf.memory_kib,
            t: kdf.iterations,
            p: kdf.parallelism,
            salt_b64: b64.encode(salt),
        },
        nonce_b64: b64.encode(nonce),
        ct_b64: b64.encode(ct),
    })
}

pub fn open(b: &SealedBox, password: &[u8]) -> eyre::Result<Zeroizing<Vec<u8>>> {
    if b.v != SEALED_BOX_VERSION {
        eyre::bail!("unsupported sealed box version: {}", b.v);
    }
    if b.kdf.alg != KDF_ALG {
        eyre::bail!("unsupported kdf: {}", b.kdf.alg);
    }
    if b.kdf.m_kib > MAX_MEMORY_KIB || b.kdf.t > MAX_ITERATIONS || b.kdf.p > MAX_PARALLELISM {
        eyre::bail!("kdf cost out of bounds");
    }
    let params = argon2_params(b.kdf.m_kib, b.kdf.t, b.kdf.p)?;

    let b64 = base64::engine::general_purpose::STANDARD;
    let salt = b64.decode(&b.kdf.salt_b64).context("decode salt")?;
    let nonce = b64.decode(&b.nonce_b64).context("decode nonce")?;
    if nonce.len() != 12 {
        eyre::bail!("invalid nonce length");
    }
    let ct = b64.decode(&b.ct_b64).context("decode ciphertext")?;

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).context("aes init")?;
    let pt = cipher
        .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
        .map_err(|e| eyre::eyre!("aes decrypt: {e}"))?;
    Ok(Zeroizing::new(pt))
}

/// Argon2id → HKDF-SHA256 → AES-256-GCM, serialized as a JSON [`SealedBox`].
///
/// KDF costs are written into every box, so changing [`KdfConfig`] only
/// affects new encryptions.
#[derive(Debug, Clone)]
pub struct Argon2AesGcm {
    kdf: KdfConfig,
}

impl Argon2AesGcm {
    pub fn new(kdf: KdfConfig) -> eyre::Result<Self> {
        argon2_params(kdf.memory_kib, kdf.iterations, kdf.parallelism)
            .context("invalid kdf config")?;
        Ok(Self { kdf })
    }
}

impl PasswordEncryptor for Argon2AesGcm {
    async fn encrypt<P: Serialize + Sync>(
        &self,
        password: &SecretString,
        payload: &P,
    ) -> eyre::Result<String> {
        // Pre-sized so a mnemonic payload serializes without reallocating.
        let mut plaintext = Zeroizing::new(Vec::with_capacity(1024));
        serde_json::to_writer(&mut *plaintext, payload).context("serialize payload")?;
        let password = Zeroizing::new(password.expose_secret().as_bytes().to_vec());
        let kdf = self.kdf.clone();

        let sealed = tokio::task::spawn_blocking(move || seal(&kdf, &password, &plaintext))
            .await
            .context("encrypt task")??;
        serde_json::to_string(&sealed).context("serialize sealed box")
    }

    async fn decrypt(
        &self,
        password: &SecretString,
        ciphertext: &str,
    ) -> eyre::Result<serde_json::Value> {
        let sealed: SealedBox = serde_json::from_str(ciphertext).context("parse sealed box")?;
        let password = Zeroizing::new(password.expose_secret().as_bytes().to_vec());

        let plaintext = tokio::task::spawn_blocking(move || open(&sealed, &password))
            .await
            .context("decrypt task")??;
        serde_json::from_slice(&plaintext).context("parse decrypted payload")
    }
}

#[cfg(test)]
pub(crate) fn cheap_kdf() -> KdfConfig {
    KdfConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}
