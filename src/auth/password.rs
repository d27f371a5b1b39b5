use argon2::{
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier, Salt, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand::{rngs::OsRng, RngCore};
use tracing::{error, warn};

use crate::config::PasswordConfig;

#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    #[error("entropy source failure: {0}")]
    Entropy(#[from] rand::Error),
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
    #[error("argon2 failure: {0}")]
    Hash(password_hash::Error),
}

/// Salted Argon2id hashing with constant-time verification.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    // Verified against when a stored digest is unusable, so a corrupt digest
    // costs the same as a wrong password.
    decoy: String,
}

impl PasswordHasher {
    pub fn new(cfg: PasswordConfig) -> Result<Self, HashingError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(HashingError::Params)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut filler = [0u8; 32];
        OsRng.try_fill_bytes(&mut filler)?;
        let decoy = hash_with(&argon2, &filler)?;

        Ok(Self { argon2, decoy })
    }

    pub fn hash(&self, plain: &str) -> Result<String, HashingError> {
        hash_with(&self.argon2, plain.as_bytes()).map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            e
        })
    }

    /// Never fails: an unusable digest is treated as a mismatch.
    pub fn verify(&self, digest: &str, plain: &str) -> bool {
        match self.check(digest, plain) {
            Ok(()) => true,
            Err(password_hash::Error::Password) => false,
            Err(e) => {
                warn!(error = %e, "stored password digest is unusable");
                self.verify_decoy(plain);
                false
            }
        }
    }

    /// `Error::Password` means a well-formed digest and a wrong password. Any
    /// other error means the digest itself could not be verified against.
    fn check(&self, digest: &str, plain: &str) -> password_hash::Result<()> {
        let parsed = PasswordHash::new(digest)?;
        self.argon2.verify_password(plain.as_bytes(), &parsed)
    }

    /// Burns one verification so that callers without a real digest (unknown
    /// username) take as long as callers with one.
    pub fn verify_decoy(&self, plain: &str) {
        if let Ok(parsed) = PasswordHash::new(&self.decoy) {
            let _ = self.argon2.verify_password(plain.as_bytes(), &parsed);
        }
    }
}

fn hash_with(argon2: &Argon2<'static>, plain: &[u8]) -> Result<String, HashingError> {
    let mut raw_salt = [0u8; Salt::RECOMMENDED_LENGTH];
    OsRng.try_fill_bytes(&mut raw_salt)?;
    let salt = SaltString::encode_b64(&raw_salt).map_err(HashingError::Hash)?;
    let hash = argon2
        .hash_password(plain, &salt)
        .map_err(HashingError::Hash)?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(PasswordConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap argon2 params are valid")
}
