use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context as _, Result};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

/// AES-256-GCM for descriptors at rest, stored as hex of `nonce || ciphertext`.
#[derive(Clone)]
pub struct DescriptorCipher {
    cipher: Aes256Gcm,
}

impl DescriptorCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("encrypt descriptor"))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(hex::encode(combined))
    }

    /// Plaintext is wiped when the returned value is dropped.
    pub fn decrypt(&self, encrypted_hex: &str) -> Result<Zeroizing<String>> {
        let combined = hex::decode(encrypted_hex).context("decode encrypted descriptor hex")?;
        anyhow::ensure!(combined.len() > NONCE_LEN, "encrypted descriptor too short");

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| anyhow::anyhow!("decrypt descriptor"))?,
        );

        let text = std::str::from_utf8(&plaintext).context("descriptor is not utf-8")?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

impl std::fmt::Debug for DescriptorCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DescriptorCipher(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_fresh_nonces() {
        let cipher = DescriptorCipher::new(&[7u8; 32]);
        let descriptor = "ct(slip77(ab),elwpkh(xpub/*))";

        let a = cipher.encrypt(descriptor).expect("encrypt");
        let b = cipher.encrypt(descriptor).expect("encrypt");
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).expect("decrypt").as_str(), descriptor);
        assert_eq!(cipher.decrypt(&b).expect("decrypt").as_str(), descriptor);
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let cipher = DescriptorCipher::new(&[1u8; 32]);
        let encrypted = cipher.encrypt("descriptor").expect("encrypt");

        assert!(DescriptorCipher::new(&[2u8; 32]).decrypt(&encrypted).is_err());

        let mut tampered = hex::decode(&encrypted).expect("hex");
        let last = tampered.len() - 1;
        tampered[last] ^= 1;
        assert!(cipher.decrypt(&hex::encode(tampered)).is_err());
        assert!(cipher.decrypt("00").is_err());
    }
}
