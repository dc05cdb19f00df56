use super::wordlist::Wordlist;
use crate::errors::KeyringError;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const WORDLIST_LEN: u16 = 2048;

/// A mnemonic stored as packed little-endian `u16` wordlist indices.
///
/// Two bytes per word instead of the ASCII phrase, and never a searchable
/// string. Zeroized on drop; `Debug` only prints the length.
#[derive(PartialEq, Eq)]
pub struct BinaryMnemonic(Vec<u8>);

impl BinaryMnemonic {
    /// Wrap raw bytes as-is. Length is not checked here; decoding is.
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[cfg(test)]
    pub fn from_indices(indices: &[u16]) -> Self {
        let mut out = Vec::with_capacity(indices.len() * 2);
        for i in indices {
            out.extend_from_slice(&i.to_le_bytes());
        }
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.0.len() / 2
    }

    /// Unpack into indices. Fails on an odd byte count.
    pub fn indices(&self) -> Result<Zeroizing<Vec<u16>>, KeyringError> {
        if self.0.len() % 2 != 0 {
            return Err(KeyringError::MalformedBinary(
                "odd number of bytes, not a whole number of 16-bit indices",
            ));
        }
        let mut out = Zeroizing::new(Vec::with_capacity(self.word_count()));
        for pair in self.0.chunks_exact(2) {
            let &[lo, hi] = pair else {
                return Err(KeyringError::MalformedBinary("truncated index"));
            };
            out.push(u16::from_le_bytes([lo, hi]));
        }
        Ok(out)
    }
}

/// Zeroes the bytes in place and keeps the length, so a caller holding the
/// buffer sees an all-zero mnemonic afterwards.
impl Zeroize for BinaryMnemonic {
    fn zeroize(&mut self) {
        self.0.as_mut_slice().zeroize();
    }
}

impl Drop for BinaryMnemonic {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl ZeroizeOnDrop for BinaryMnemonic {}

impl fmt::Debug for BinaryMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryMnemonic")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Encode a whitespace separated phrase as [`BinaryMnemonic`].
///
/// Word count is not checked here; [`Wordlist::is_valid`] gates encryption.
pub fn word_sequence_to_binary<W: Wordlist + ?Sized>(
    wordlist: &W,
    phrase: &str,
) -> Result<BinaryMnemonic, KeyringError> {
    // Exact capacity: the buffer must never reallocate and leave a stale copy behind.
    let words = phrase.split_whitespace().count();
    let mut out = BinaryMnemonic(Vec::with_capacity(words * 2));
    for (position, word) in phrase.split_whitespace().enumerate() {
        let index = wordlist
            .lookup_index(word)
            .ok_or(KeyringError::InvalidWord { position })?;
        out.0.extend_from_slice(&index.to_le_bytes());
    }
    Ok(out)
}

/// Decode a [`BinaryMnemonic`] back into its space separated phrase.
///
/// Dangerous: this materializes the secret as a string. Only call it when the
/// phrase has to be shown or backed up, and drop the result right after.
pub fn binary_to_word_sequence<W: Wordlist + ?Sized>(
    wordlist: &W,
    mnemonic: &BinaryMnemonic,
) -> Result<Zeroizing<String>, KeyringError> {
    if mnemonic.is_empty() {
        return Ok(Zeroizing::new(String::new()));
    }
    let indices = mnemonic.indices()?;

    let mut total = indices.len().saturating_sub(1);
    for (position, &index) in indices.iter().enumerate() {
        let word = resolve(wordlist, position, index)?;
        total += word.len();
    }

    let mut out = Zeroizing::new(String::with_capacity(total));
    for (position, &index) in indices.iter().enumerate() {
        if position > 0 {
            out.push(' ');
        }
        out.push_str(resolve(wordlist, position, index)?);
    }
    Ok(out)
}

fn resolve<W: Wordlist + ?Sized>(
    wordlist: &W,
    position: usize,
    index: u16,
) -> Result<&str, KeyringError> {
    if index >= WORDLIST_LEN {
        return Err(KeyringError::IndexOutOfRange { position, index });
    }
    wordlist
        .lookup_word(index)
        .ok_or(KeyringError::IndexOutOfRange { position, index })
}
