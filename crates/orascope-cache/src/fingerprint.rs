//! Catalog fingerprint
//!
//! A SHA-256 digest over the Oracle version banner, the target schema name
//! and the catalog generation (the `MAX(LAST_DDL_TIME)` aggregate plus
//! object count). The hex form names the cache file on disk; a mismatch at
//! startup means the on-disk index describes a different catalog state.

use orascope_core::{CatalogGeneration, OrascopeError, Result};
use sha2::{Digest, Sha256};

/// Identifies one catalog snapshot of one `(connection-target, schema)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogFingerprint([u8; 32]);

impl CatalogFingerprint {
    pub const LEN: usize = 32;

    /// Compute the fingerprint for a catalog state.
    pub fn compute(banner: &str, schema: &str, generation: &CatalogGeneration) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(banner.as_bytes());
        hasher.update([0]);
        hasher.update(schema.to_ascii_uppercase().as_bytes());
        hasher.update([0]);
        hasher.update(generation.max_last_ddl.as_deref().unwrap_or("").as_bytes());
        hasher.update([0]);
        hasher.update(generation.object_count.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            OrascopeError::CacheCorrupt(format!(
                "fingerprint must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Lower-case hex digest, used as the cache file stem.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for CatalogFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(max_ddl: Option<&str>, count: u64) -> CatalogGeneration {
        CatalogGeneration {
            max_last_ddl: max_ddl.map(String::from),
            object_count: count,
        }
    }

    #[test]
    fn identical_inputs_yield_identical_digests() {
        let a = CatalogFingerprint::compute(
            "Oracle 19c",
            "HR",
            &generation(Some("2026-01-01 00:00:00"), 42),
        );
        let b = CatalogFingerprint::compute(
            "Oracle 19c",
            "HR",
            &generation(Some("2026-01-01 00:00:00"), 42),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn schema_case_does_not_change_digest() {
        let g = generation(None, 1);
        assert_eq!(
            CatalogFingerprint::compute("b", "hr", &g),
            CatalogFingerprint::compute("b", "HR", &g)
        );
    }

    #[test]
    fn generation_changes_digest() {
        let a = CatalogFingerprint::compute("b", "HR", &generation(Some("x"), 1));
        let b = CatalogFingerprint::compute("b", "HR", &generation(Some("x"), 2));
        let c = CatalogFingerprint::compute("b", "HR", &generation(Some("y"), 1));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hex_round_trip() {
        let fp = CatalogFingerprint::compute("b", "HR", &generation(None, 0));
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(
            CatalogFingerprint::try_from_slice(fp.as_bytes()).unwrap(),
            fp
        );
        assert!(CatalogFingerprint::try_from_slice(&[1, 2, 3]).is_err());
    }
}
