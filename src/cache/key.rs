//! Cache key normalization and request fingerprinting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Normalize an opaque key: lower-cased, runs of whitespace collapsed to a
/// single space, trimmed. All store lookups go through this so `"Foo  Bar"`
/// and `"foo bar"` address the same entry.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub model: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: normalize_key(&hash.into()),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Builds deterministic request fingerprints for cache keys.
///
/// The fingerprint is a SHA-256 over a canonical (BTreeMap-ordered) encoding
/// of the request parts, so identical requests hit the same entry and any
/// parameter change produces a new one.
pub struct CacheKeyGenerator {
    include_model: bool,
    include_temperature: bool,
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self {
            include_model: true,
            include_temperature: true,
            salt: None,
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn generate(
        &self,
        model: Option<&str>,
        messages: &[serde_json::Value],
        temperature: Option<f64>,
    ) -> CacheKey {
        let mut parts: BTreeMap<String, String> = BTreeMap::new();
        if self.include_model {
            if let Some(m) = model {
                parts.insert("model".into(), m.into());
            }
        }
        if self.include_temperature {
            if let Some(t) = temperature {
                parts.insert("temperature".into(), format!("{:.2}", t));
            }
        }
        parts.insert(
            "messages".into(),
            serde_json::to_string(messages).unwrap_or_default(),
        );
        if let Some(ref s) = self.salt {
            parts.insert("salt".into(), s.clone());
        }
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        let mut key = CacheKey::new(hash);
        if let Some(m) = model {
            key = key.with_model(m);
        }
        key
    }
}

impl Default for CacheKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_key("  Hello   World \t"), "hello world");
        assert_eq!(normalize_key("already normal"), "already normal");
    }

    #[test]
    fn test_equivalent_keys_address_same_entry() {
        assert_eq!(CacheKey::new("Foo  Bar"), CacheKey::new("foo bar"));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let generator = CacheKeyGenerator::new();
        let messages = vec![json!({"role": "user", "content": "hello"})];
        let a = generator.generate(Some("gpt-4o"), &messages, Some(0.7));
        let b = generator.generate(Some("gpt-4o"), &messages, Some(0.7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_varies_with_parameters() {
        let generator = CacheKeyGenerator::new();
        let messages = vec![json!({"role": "user", "content": "hello"})];
        let a = generator.generate(Some("gpt-4o"), &messages, Some(0.7));
        let b = generator.generate(Some("gpt-4o"), &messages, Some(0.8));
        let c = generator.generate(Some("gpt-4o-mini"), &messages, Some(0.7));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_salt_partitions_fingerprints() {
        let messages = vec![json!({"role": "user", "content": "hello"})];
        let plain = CacheKeyGenerator::new().generate(None, &messages, None);
        let salted = CacheKeyGenerator::new()
            .with_salt("tenant-a")
            .generate(None, &messages, None);
        assert_ne!(plain, salted);
    }
}
