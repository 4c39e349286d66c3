/*!
 * Per-container key derivation and AES-128-CBC payload decryption
 */

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use tracing::debug;

use crate::error::{FurrowError, Result};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// AES block and key size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Fixed secret every container key is derived from
pub const MASTER_KEY: [u8; BLOCK_SIZE] = [
    0xe9, 0x89, 0x71, 0x5d, 0x4c, 0xaa, 0x11, 0x9b, 0x5f, 0xc8, 0xea, 0xc3, 0xac, 0x46, 0xb7, 0xc3,
];

/// AES-128 key for one container
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DerivedKey([u8; BLOCK_SIZE]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Keys stay out of logs unless asked for explicitly via `to_hex`
impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Decode a container UUID (dashes allowed, any case) into its 16 raw bytes
pub fn uuid_bytes(uuid: &str) -> Result<[u8; BLOCK_SIZE]> {
    let cleaned = uuid.replace('-', "").to_lowercase();
    let bytes = hex::decode(&cleaned)
        .map_err(|e| FurrowError::InvalidKeyMaterial(format!("uuid '{}': {}", uuid, e)))?;

    bytes.as_slice().try_into().map_err(|_| {
        FurrowError::InvalidKeyMaterial(format!(
            "uuid '{}' decodes to {} bytes, expected {}",
            uuid,
            bytes.len(),
            BLOCK_SIZE
        ))
    })
}

/// Derive the container key: UUID bytes XOR [`MASTER_KEY`]
pub fn derive_key(uuid: &str) -> Result<DerivedKey> {
    let uuid = uuid_bytes(uuid)?;
    let mut key = [0u8; BLOCK_SIZE];
    for (k, (u, m)) in key.iter_mut().zip(uuid.iter().zip(MASTER_KEY.iter())) {
        *k = u ^ m;
    }
    Ok(DerivedKey(key))
}

/// Decrypt an AES-128-CBC payload.
///
/// No padding is stripped: the plaintext is exactly as long as the
/// ciphertext and any padding bytes stay at its tail.
pub fn decrypt_payload(
    ciphertext: &[u8],
    key: &DerivedKey,
    iv: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(FurrowError::Decryption(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let mut buffer = ciphertext.to_vec();
    let plaintext_len = Aes128CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| FurrowError::Decryption(e.to_string()))?
        .len();
    buffer.truncate(plaintext_len);

    debug!("Decrypted {} bytes", plaintext_len);
    Ok(buffer)
}
