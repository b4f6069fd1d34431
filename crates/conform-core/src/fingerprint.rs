//! Content and option fingerprints used as cache keys.

use serde::{Deserialize, Serialize};

/// A blake3 digest of some input, printed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprints raw bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Fingerprints file content.
    #[must_use]
    pub fn of_content(content: &str) -> Self {
        Self::of_bytes(content.as_bytes())
    }

    /// Short hex prefix for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.to_string()[..12].to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(Fingerprint::of_content("abc"), Fingerprint::of_content("abc"));
        assert_ne!(Fingerprint::of_content("abc"), Fingerprint::of_content("abd"));
    }

    #[test]
    fn display_is_hex() {
        let fp = Fingerprint::of_content("");
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short(), hex[..12]);
    }
}
