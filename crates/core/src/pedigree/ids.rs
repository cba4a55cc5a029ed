use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Check whether a string is shaped like a NAAB breeder code.
///
/// The pattern is fixed at ten ASCII characters: a 3-digit stud code, a
/// 2-letter breed code (uppercase), and a 5-digit bull number, e.g.
/// `007HO12345`.
pub fn is_breeder_code(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 10 {
        return false;
    }
    bytes[..3].iter().all(|b| b.is_ascii_digit())
        && bytes[3..5].iter().all(|b| b.is_ascii_uppercase())
        && bytes[5..].iter().all(|b| b.is_ascii_digit())
}

/// Bidirectional map between breeder-code (NAAB) identifiers and canonical
/// registration identifiers.
///
/// Populated while the bull registry is ingested. Lookups are best-effort:
/// an identifier with no mapping is returned unchanged, so callers can pass
/// any id they hold without checking its form first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdResolver {
    /// Breeder code -> canonical registration id.
    to_canonical: IndexMap<String, String>,
    /// Canonical registration id -> breeder code.
    to_code: IndexMap<String, String>,
}

impl IdResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered code pairs.
    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }

    /// Whether no code pairs are registered.
    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }

    /// Register a breeder-code / canonical-id pair.
    ///
    /// A malformed code is logged and ignored; the first registration of a
    /// code wins.
    pub fn register(&mut self, code: &str, canonical: &str) {
        if !is_breeder_code(code) {
            log::warn!(
                "ignoring malformed breeder code '{}' for animal '{}'",
                code,
                canonical
            );
            return;
        }
        if self.to_canonical.contains_key(code) {
            log::warn!(
                "breeder code '{}' already mapped; keeping the first registration",
                code
            );
            return;
        }
        self.to_canonical.insert(code.to_string(), canonical.to_string());
        self.to_code.insert(canonical.to_string(), code.to_string());
    }

    /// Resolve an identifier to its canonical registration form.
    ///
    /// A breeder-code-shaped id with a known mapping resolves to the mapped
    /// registration id; anything else is returned unchanged.
    pub fn canonical<'a>(&'a self, id: &'a str) -> &'a str {
        if is_breeder_code(id) {
            if let Some(canonical) = self.to_canonical.get(id) {
                return canonical;
            }
        }
        id
    }

    /// Reverse lookup: the breeder code registered for a canonical id.
    pub fn breeder_code(&self, canonical: &str) -> Option<&str> {
        self.to_code.get(canonical).map(String::as_str)
    }
}
