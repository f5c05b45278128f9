//! Key Generator (§4.A) — produces key records from a CSPRNG.

use rand::RngCore;
use uuid::Uuid;

use crate::errors::domain::DomainError;
use crate::model::KeyRecord;

pub struct KeyGenerator;

impl KeyGenerator {
    /// Generates a single key of `size_bytes` bytes of CSPRNG output.
    ///
    /// Fails with [`DomainError::Validation`] on a non-positive size — there is
    /// no sensible key of zero or negative length.
    pub fn generate(size_bytes: usize) -> Result<KeyRecord, DomainError> {
        if size_bytes == 0 {
            return Err(DomainError::validation(
                "key size must be a positive number of bytes",
            ));
        }

        let mut material = vec![0u8; size_bytes];
        rand::rng().fill_bytes(&mut material);

        Ok(KeyRecord::new(Uuid::new_v4().to_string(), material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_size() {
        let key = KeyGenerator::generate(32).unwrap();
        assert_eq!(key.key_material.len(), 32);
    }

    #[test]
    fn rejects_zero_size() {
        assert!(KeyGenerator::generate(0).is_err());
    }

    #[test]
    fn ids_are_unique() {
        let a = KeyGenerator::generate(16).unwrap();
        let b = KeyGenerator::generate(16).unwrap();
        assert_ne!(a.key_id, b.key_id);
        assert_ne!(a.key_material, b.key_material);
    }
}
