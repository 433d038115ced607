//! Key material and the two ciphers an NCM file is wrapped in.

use crate::error::{ErrorKind, Result};
use aes::Aes128;
use block_modes::block_padding::Pkcs7;
use block_modes::{BlockMode, Ecb};

type Aes128Ecb = Ecb<Aes128, Pkcs7>;

/// Wraps the per-file RC4 key.
pub(crate) const CORE_KEY: &[u8; 16] = b"hzHRAmso5kInbaxW";
/// Wraps the JSON metadata block.
pub(crate) const META_KEY: &[u8; 16] = b"#14ljk_!\\]&0U<'(";

pub(crate) fn aes_decrypt(key: &[u8; 16], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Ecb::new_from_slices(key, &[]).map_err(|_| ErrorKind::Cipher)?;
    Ok(cipher.decrypt_vec(data).map_err(|_| ErrorKind::Cipher)?)
}

#[cfg(test)]
pub(crate) fn aes_encrypt(key: &[u8; 16], data: &[u8]) -> Vec<u8> {
    Aes128Ecb::new_from_slices(key, &[]).unwrap().encrypt_vec(data)
}

/// Keystream for the audio payload.
///
/// The key schedule is RC4's, but the stream itself only depends on the
/// byte offset modulo 256, so all 256 stream bytes are computed up front.
#[derive(Clone)]
pub(crate) struct KeyBox {
    stream: [u8; 256],
}

impl KeyBox {
    pub(crate) fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            exn::bail!(ErrorKind::Cipher);
        }
        let mut sbox = [0u8; 256];
        for (i, slot) in sbox.iter_mut().enumerate() {
            // Infallible: i < 256.
            *slot = i as u8;
        }
        let mut last: u8 = 0;
        for (i, k) in (0..256).zip(key.iter().cycle()) {
            let swap = sbox[i];
            let c = swap.wrapping_add(last).wrapping_add(*k);
            sbox[i] = sbox[c as usize];
            sbox[c as usize] = swap;
            last = c;
        }

        let mut stream = [0u8; 256];
        for (i, out) in stream.iter_mut().enumerate() {
            let j = sbox[i] as usize;
            *out = sbox[(j + sbox[(j + i) & 0xFF] as usize) & 0xFF];
        }
        Ok(Self { stream })
    }

    /// XOR `data`, which starts `offset` bytes into the audio payload, with
    /// the keystream. Applying it twice gives back the input.
    pub(crate) fn apply(&self, data: &mut [u8], offset: u64) {
        // Only the low byte of the offset matters.
        let start = (offset & 0xFF) as usize;
        for (n, byte) in data.iter_mut().enumerate() {
            *byte ^= self.stream[(start + n + 1) & 0xFF];
        }
    }
}
