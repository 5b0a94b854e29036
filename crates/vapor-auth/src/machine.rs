//! Machine identity and credential encryption

use std::net::Ipv4Addr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};
use vapor_wire::IP_OBFUSCATION_MASK;

use crate::error::{Error, Result};

/// Length of the generated machine id
pub const MACHINE_ID_LEN: usize = 32;

/// Generates a fresh random machine id. Generated once per install and
/// persisted so the backend sees a stable device.
#[must_use]
pub fn generate_machine_id() -> Vec<u8> {
    let mut bytes = vec![0u8; MACHINE_ID_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// XOR-masks a private IPv4 address for the logon payload.
#[must_use]
pub fn obfuscate_ipv4(addr: Ipv4Addr) -> u32 {
    u32::from(addr) ^ IP_OBFUSCATION_MASK
}

/// OS identifier sent on logon. Non-Windows identifiers are negative
/// in the backend enumeration and are clamped to zero on the wire.
#[must_use]
pub fn os_type() -> u32 {
    if cfg!(target_os = "windows") { 16 } else { 0 }
}

/// Account-specific RSA key the backend hands out for password
/// encryption
pub struct PasswordKey {
    key: RsaPublicKey,
    /// Key timestamp echoed back on credential submission
    pub timestamp: u64,
}

impl PasswordKey {
    /// Builds the key from the hex modulus and exponent of a key
    /// response.
    pub fn from_hex(modulus: &str, exponent: &str, timestamp: u64) -> Result<Self> {
        let n = BigUint::parse_bytes(modulus.as_bytes(), 16)
            .ok_or(Error::MalformedKey { field: "modulus" })?;
        let e = BigUint::parse_bytes(exponent.as_bytes(), 16)
            .ok_or(Error::MalformedKey { field: "exponent" })?;
        let key = RsaPublicKey::new(n, e).map_err(|_| Error::MalformedKey { field: "modulus" })?;
        Ok(Self { key, timestamp })
    }

    /// Encrypts the password with PKCS#1 v1.5 padding and encodes the
    /// ciphertext as base64, the form the credential call expects.
    pub fn encrypt(&self, password: &str) -> Result<String> {
        let ciphertext =
            self.key
                .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, password.as_bytes())?;
        Ok(STANDARD.encode(ciphertext))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rsa::RsaPrivateKey;
    use rsa::traits::PublicKeyParts;

    use super::*;

    #[test]
    fn test_machine_ids_are_random() {
        let first = generate_machine_id();
        let second = generate_machine_id();
        assert_eq!(first.len(), MACHINE_ID_LEN);
        assert_ne!(first, second);
    }

    #[test]
    fn test_obfuscation_is_an_involution() {
        let addr = Ipv4Addr::new(192, 168, 1, 20);
        let masked = obfuscate_ipv4(addr);
        assert_ne!(masked, u32::from(addr));
        assert_eq!(masked ^ IP_OBFUSCATION_MASK, u32::from(addr));
    }

    #[test]
    fn test_password_round_trips_through_encryption() {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let modulus = private.n().to_str_radix(16);
        let exponent = private.e().to_str_radix(16);

        let key = PasswordKey::from_hex(&modulus, &exponent, 1234).unwrap();
        let encrypted = key.encrypt("hunter2").unwrap();

        let ciphertext = STANDARD.decode(encrypted).unwrap();
        let plain = private.decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap();
        assert_eq!(plain, b"hunter2");
        assert_eq!(key.timestamp, 1234);
    }

    #[test]
    fn test_malformed_key_material_is_rejected() {
        assert!(PasswordKey::from_hex("not hex!", "10001", 0).is_err());
        assert!(PasswordKey::from_hex("abcdef", "zz", 0).is_err());
    }
}
