use std::fmt;

use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::secp256k1::rand::RngCore as _;
use bitcoin::secp256k1::rand::thread_rng;
use bitcoin::secp256k1::{Keypair, Message, Secp256k1};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hex-encoded secret that is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretHex(String);

impl SecretHex {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretHex(<redacted>)")
    }
}

/// Per-swap secp256k1 keypair.
pub struct SwapKeys {
    keypair: Keypair,
}

impl SwapKeys {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        Self {
            keypair: Keypair::new(&secp, &mut thread_rng()),
        }
    }

    pub fn public_key_hex(&self) -> String {
        self.keypair.public_key().to_string()
    }

    /// BIP340 signature over SHA-256 of the address string.
    pub fn sign_address(&self, address: &str) -> String {
        let secp = Secp256k1::new();
        let digest = sha256::Hash::hash(address.as_bytes()).to_byte_array();
        let sig = secp.sign_schnorr(&Message::from_digest(digest), &self.keypair);
        hex::encode(sig.serialize())
    }

    /// Consumes the keys, handing the private key over for persistence.
    pub fn into_secret(mut self) -> SecretHex {
        let secret = SecretHex::from_bytes(&self.keypair.secret_bytes());
        self.keypair.non_secure_erase();
        secret
    }
}

impl Drop for SwapKeys {
    fn drop(&mut self) {
        self.keypair.non_secure_erase();
    }
}

impl fmt::Debug for SwapKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapKeys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// 32 random bytes whose SHA-256 locks a reverse or chain swap.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Preimage([u8; 32]);

impl Preimage {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(sha256::Hash::hash(&self.0).to_byte_array())
    }

    pub fn secret(&self) -> SecretHex {
        SecretHex::from_bytes(&self.0)
    }

    pub fn into_secret(self) -> SecretHex {
        self.secret()
    }
}

impl fmt::Debug for Preimage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(<redacted>)")
    }
}
