use super::codec::{BinaryMnemonic, WORDLIST_LEN};
use bip39::Language;
use sha2::{Digest as _, Sha256};
use zeroize::Zeroizing;

const BITS_PER_WORD: usize = 11;

/// The wordlist and checksum rule a mnemonic is interpreted against.
///
/// Injected into [`super::Keyring`] so tests (or other languages) can substitute
/// their own list without touching global state.
pub trait Wordlist: Send + Sync {
    fn lookup_index(&self, word: &str) -> Option<u16>;

    fn lookup_word(&self, index: u16) -> Option<&str>;

    /// Whether `mnemonic` is a well-formed phrase this wallet accepts for encryption.
    fn is_valid(&self, mnemonic: &BinaryMnemonic) -> bool;
}

/// The BIP-39 English list. Only 12 and 24 word phrases are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bip39English;

impl Wordlist for Bip39English {
    fn lookup_index(&self, word: &str) -> Option<u16> {
        Language::English.find_word(word)
    }

    fn lookup_word(&self, index: u16) -> Option<&str> {
        Language::English
            .word_list()
            .get(usize::from(index))
            .copied()
    }

    fn is_valid(&self, mnemonic: &BinaryMnemonic) -> bool {
        let Ok(indices) = mnemonic.indices() else {
            return false;
        };
        matches!(indices.len(), 12 | 24) && checksum_matches(&indices)
    }
}

/// BIP-39 checksum: the trailing `words * 11 / 33` bits must equal the leading
/// bits of SHA-256 over the entropy carried by the remaining bits.
pub fn checksum_matches(indices: &[u16]) -> bool {
    let total_bits = indices.len() * BITS_PER_WORD;
    if indices.is_empty() || total_bits % 33 != 0 {
        return false;
    }
    let cs_bits = total_bits / 33;
    if cs_bits > 8 || indices.iter().any(|i| *i >= WORDLIST_LEN) {
        return false;
    }
    let ent_bits = total_bits - cs_bits;

    let mut entropy = Zeroizing::new(vec![0_u8; ent_bits / 8]);
    let mut checksum = 0_u16;
    for (bit, pos) in (0..total_bits).map(|b| (b, b % BITS_PER_WORD)) {
        let Some(word) = indices.get(bit / BITS_PER_WORD) else {
            return false;
        };
        let set = (word >> (BITS_PER_WORD - 1 - pos)) & 1 == 1;
        if bit < ent_bits {
            if set {
                let Some(byte) = entropy.get_mut(bit / 8) else {
                    return false;
                };
                *byte |= 0x80_u8 >> (bit % 8);
            }
        } else {
            checksum = (checksum << 1) | u16::from(set);
        }
    }

    let digest = Sha256::digest(entropy.as_slice());
    let Some(first) = digest.first() else {
        return false;
    };
    u16::from(*first) >> (8 - cs_bits) == checksum
}
