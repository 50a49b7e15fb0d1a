use std::io::Read;

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use log::debug;
use sodiumoxide::crypto::sign::ed25519;

use crate::error::{PackError, Result};
use crate::hash;

pub fn init() -> Result<()> {
    sodiumoxide::init().map_err(|_| PackError::CryptoError("libsodium failed to initialize"))
}

/// Produces and checks the detached signature carried in a pack's sign
/// envelope.
pub trait SignAlgorithm {
    fn sign(&self, data: &mut dyn Read) -> Result<Vec<u8>>;

    fn verify(&self, data: &mut dyn Read, signature: &[u8]) -> Result<bool>;

    fn verify_stream(&self, data: &mut dyn Read, signature: &mut dyn Read) -> Result<bool> {
        let mut sig = Vec::new();
        signature.read_to_end(&mut sig)?;
        self.verify(data, &sig)
    }

    /// Verify against a digest computed elsewhere, `hash` is its hex text.
    fn verify_hash(&self, hash: &str, signature: &mut dyn Read) -> Result<bool>;
}

/// Ed25519 over the hex text of the BLAKE3 digest of the data.
pub struct Ed25519SignAlgorithm {
    public: ed25519::PublicKey,
    secret: Option<ed25519::SecretKey>,
}

impl Ed25519SignAlgorithm {
    /// New key pair as base64 text, the secret half embeds the public one.
    pub fn generate_key_pair() -> Result<String> {
        init()?;
        let (_, secret) = ed25519::gen_keypair();
        Ok(URL_SAFE.encode(&secret.0[..]))
    }

    pub fn public_key(key_pair: &str) -> Result<String> {
        let secret = decode_secret(key_pair)?;
        Ok(URL_SAFE.encode(public_of(&secret)?.0))
    }

    pub fn from_key_pair(key_pair: &str) -> Result<Self> {
        init()?;
        let secret = decode_secret(key_pair)?;
        Ok(Ed25519SignAlgorithm {
            public: public_of(&secret)?,
            secret: Some(secret),
        })
    }

    /// Verify-only instance.
    pub fn from_public_key(public_key: &str) -> Result<Self> {
        init()?;
        let bytes = URL_SAFE.decode(public_key.trim())?;
        let public = ed25519::PublicKey::from_slice(&bytes)
            .ok_or(PackError::CryptoError("public key has the wrong length"))?;
        Ok(Ed25519SignAlgorithm {
            public,
            secret: None,
        })
    }

    pub fn can_sign(&self) -> bool {
        self.secret.is_some()
    }

    fn check(&self, hash: &str, signature: &[u8]) -> bool {
        if signature.len() != ed25519::SIGNATUREBYTES {
            debug!("signature is {} bytes, expected {}", signature.len(), ed25519::SIGNATUREBYTES);
            return false;
        }

        // Combined form is signature || message
        let mut signed = Vec::with_capacity(signature.len() + hash.len());
        signed.extend_from_slice(signature);
        signed.extend_from_slice(hash.as_bytes());

        match ed25519::verify(&signed, &self.public) {
            Ok(message) => message == hash.as_bytes(),
            Err(()) => false,
        }
    }
}

fn decode_secret(key_pair: &str) -> Result<ed25519::SecretKey> {
    let bytes = URL_SAFE.decode(key_pair.trim())?;
    ed25519::SecretKey::from_slice(&bytes).ok_or(PackError::CryptoError("key pair has the wrong length"))
}

fn public_of(secret: &ed25519::SecretKey) -> Result<ed25519::PublicKey> {
    ed25519::PublicKey::from_slice(&secret.0[ed25519::SEEDBYTES..])
        .ok_or(PackError::CryptoError("key pair has the wrong length"))
}

impl SignAlgorithm for Ed25519SignAlgorithm {
    fn sign(&self, data: &mut dyn Read) -> Result<Vec<u8>> {
        let secret = self.secret.as_ref().ok_or(PackError::MissingSecretKey)?;
        let hash = hash::to_hex(&hash::digest(data)?);

        let mut signed = ed25519::sign(hash.as_bytes(), secret);
        signed.truncate(ed25519::SIGNATUREBYTES);
        Ok(signed)
    }

    fn verify(&self, data: &mut dyn Read, signature: &[u8]) -> Result<bool> {
        let hash = hash::to_hex(&hash::digest(data)?);
        Ok(self.check(&hash, signature))
    }

    fn verify_hash(&self, hash: &str, signature: &mut dyn Read) -> Result<bool> {
        let mut sig = Vec::new();
        signature.read_to_end(&mut sig)?;
        Ok(self.check(hash, &sig))
    }
}
