// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! scrypt key derivation.
//!
//! | Parameter | Value | Meaning |
//! |-----------|-------|---------|
//! | `log_n`   | 15    | N = 32 768 iterations |
//! | `r`       | 8     | block size (32 MiB memory with N = 2^15) |
//! | `p`       | 1     | parallelism |
//! | output    | 32    | bytes |

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{VaultError, VaultResult};

/// Length of a freshly generated salt, in bytes.
pub const SALT_LEN: usize = 32;

/// Minimum salt length accepted by [`derive_key`].
const MIN_SALT_LEN: usize = 16;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Production parameters. Changing these invalidates every stored bundle.
    pub const STANDARD: KdfParams = KdfParams {
        log_n: 15,
        r: 8,
        p: 1,
    };

    /// Cheap parameters so unit tests stay fast.
    #[cfg(test)]
    pub(crate) fn testing() -> Self {
        KdfParams {
            log_n: 8,
            r: 8,
            p: 1,
        }
    }
}

/// 256-bit symmetric key.
///
/// Zeroized on drop; deliberately neither `Clone` nor `Debug`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> VaultResult<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            VaultError::KeyDerivationFailed(format!("key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Fresh random salt from OS entropy.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key from `password` and `salt`.
///
/// # Errors
///
/// [`VaultError::KeyDerivationFailed`] on an empty password, a short salt or
/// invalid cost parameters.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParams) -> VaultResult<SymmetricKey> {
    if password.is_empty() {
        return Err(VaultError::KeyDerivationFailed(
            "password must not be empty".to_string(),
        ));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(VaultError::KeyDerivationFailed(format!(
            "salt must be at least {MIN_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }

    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, SymmetricKey::LEN)
        .map_err(|e| VaultError::KeyDerivationFailed(format!("invalid scrypt params: {e}")))?;

    let mut output = [0u8; SymmetricKey::LEN];
    scrypt::scrypt(password, salt, &scrypt_params, &mut output)
        .map_err(|e| VaultError::KeyDerivationFailed(e.to_string()))?;

    let key = SymmetricKey(output);
    output.zeroize();
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let salt = [7u8; SALT_LEN];
        let params = KdfParams::testing();

        let a = derive_key(b"hunter22", &salt, &params).unwrap();
        let b = derive_key(b"hunter22", &salt, &params).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn salt_and_password_change_output() {
        let params = KdfParams::testing();
        let base = derive_key(b"hunter22", &[1u8; 32], &params).unwrap();
        let other_salt = derive_key(b"hunter22", &[2u8; 32], &params).unwrap();
        let other_pw = derive_key(b"hunter23", &[1u8; 32], &params).unwrap();

        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_pw.as_bytes());
    }

    #[test]
    fn standard_params_are_fixed() {
        assert_eq!(
            KdfParams::STANDARD,
            KdfParams {
                log_n: 15,
                r: 8,
                p: 1
            }
        );
    }

    #[test]
    fn rejects_short_salt_and_empty_password() {
        let params = KdfParams::testing();
        assert!(matches!(
            derive_key(b"pw", &[0u8; 4], &params),
            Err(VaultError::KeyDerivationFailed(_))
        ));
        assert!(matches!(
            derive_key(b"", &[0u8; 32], &params),
            Err(VaultError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
