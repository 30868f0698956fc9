//! Passphrase-based AES as produced by CryptoJS `AES.encrypt(text, pass)`.
//!
//! The payload is base64 of `"Salted__" || salt[8] || ciphertext`; key and IV
//! come from OpenSSL's `EVP_BytesToKey` with MD5 and one iteration, and the
//! cipher is AES-256-CBC with PKCS#7 padding.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_MAGIC: &[u8; 8] = b"Salted__";
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// OpenSSL `EVP_BytesToKey` (MD5, 1 round) for a 256-bit key and 128-bit IV
pub fn derive_key_iv(passphrase: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut previous: Vec<u8> = Vec::new();
    while material.len() < KEY_LEN + IV_LEN {
        let mut ctx = md5::Context::new();
        ctx.consume(&previous);
        ctx.consume(passphrase);
        ctx.consume(salt);
        previous = ctx.compute().0.to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Decrypt a salted CryptoJS payload
pub fn decrypt_salted(passphrase: &str, payload: &str) -> Result<Vec<u8>, String> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("payload is not base64: {}", e))?;

    if raw.len() < 16 || &raw[..8] != SALT_MAGIC {
        return Err("payload is missing the Salted__ header".to_string());
    }
    let (salt, ciphertext) = raw[8..].split_at(8);
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(format!("ciphertext length {} is not a block multiple", ciphertext.len()));
    }

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), salt);
    Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| e.to_string())?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| "bad padding, wrong passphrase or corrupted payload".to_string())
}

/// Test-side counterpart of `decrypt_salted`
#[cfg(test)]
pub(crate) fn encrypt_salted(passphrase: &str, salt: [u8; 8], plaintext: &[u8]) -> String {
    use aes::cipher::BlockEncryptMut;
    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    let (key, iv) = derive_key_iv(passphrase.as_bytes(), &salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let mut raw = SALT_MAGIC.to_vec();
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&ciphertext);
    STANDARD.encode(raw)
}
