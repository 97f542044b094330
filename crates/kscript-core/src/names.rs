//! Declared-name registry with optional compaction.
//!
//! Every declared entity (variables, arrays, functions, the internal
//! loop pool and stack arenas) registers its name here. Registration
//! enforces global uniqueness; with compaction enabled, a name is
//! replaced by a 5-character digest-derived form to keep the emitted
//! script small, and uniqueness is enforced over both forms.

use std::collections::BTreeSet;

use kscript_types::{EngineError, EngineResult};
use sha2::{Digest, Sha256};

/// Alphabet indexed by the low five bits of each digest byte.
const COMPACT_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz012345";

/// A registered name with its rendering parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredName {
    /// Sigil prefix, empty for functions.
    pub sigil: String,
    /// Body actually emitted: the full name, or its compacted form.
    pub body: String,
    /// Declaration-only suffix, e.g. an array size annotation.
    pub postfix: String,
}

impl RegisteredName {
    /// Rendering used at every reference site: sigil plus body.
    pub fn render(&self) -> String {
        format!("{}{}", self.sigil, self.body)
    }

    /// Rendering used in the declaration line, including the postfix.
    pub fn render_decl(&self) -> String {
        format!("{}{}{}", self.sigil, self.body, self.postfix)
    }
}

/// Registry of every name declared during one compilation.
#[derive(Debug, Default)]
pub struct NameRegistry {
    compact: bool,
    full: BTreeSet<String>,
    compacted: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new(compact: bool) -> Self {
        NameRegistry {
            compact,
            full: BTreeSet::new(),
            compacted: BTreeSet::new(),
        }
    }

    /// Register `name` and return its rendering parts.
    ///
    /// With compaction enabled the body becomes a 5-character digest
    /// form unless `preserve` is set. Duplicates of either the full or
    /// the compacted form are rejected.
    pub fn register(
        &mut self,
        name: &str,
        sigil: &str,
        preserve: bool,
    ) -> EngineResult<RegisteredName> {
        if !self.full.insert(name.to_string()) {
            return Err(EngineError::DuplicateName(name.to_string()));
        }
        let body = if self.compact && !preserve {
            let short = compact_name(name);
            if !self.compacted.insert(short.clone()) {
                return Err(EngineError::DuplicateName(name.to_string()));
            }
            short
        } else {
            name.to_string()
        };
        Ok(RegisteredName {
            sigil: sigil.to_string(),
            body,
            postfix: String::new(),
        })
    }

    /// Forget every registration.
    pub fn reset(&mut self) {
        self.full.clear();
        self.compacted.clear();
    }
}

/// Deterministic 5-character form of a name: the first five bytes of
/// its SHA-256 digest, each mapped through a 32-symbol alphabet.
pub fn compact_name(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    digest[..5]
        .iter()
        .map(|b| COMPACT_ALPHABET[(b & 0x1f) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_unique() {
        let mut reg = NameRegistry::new(false);
        assert!(reg.register("volume", "$", false).is_ok());
        assert!(matches!(
            reg.register("volume", "$", false),
            Err(EngineError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_plain_registration_keeps_name() {
        let mut reg = NameRegistry::new(false);
        let n = reg.register("volume", "$", false).unwrap();
        assert_eq!(n.render(), "$volume");
    }

    #[test]
    fn test_compaction_is_deterministic() {
        let a = compact_name("my_variable");
        let b = compact_name("my_variable");
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert!(a.bytes().all(|c| COMPACT_ALPHABET.contains(&c)));
    }

    #[test]
    fn test_compacted_names_differ_per_input() {
        assert_ne!(compact_name("alpha"), compact_name("beta"));
    }

    #[test]
    fn test_preserve_skips_compaction() {
        let mut reg = NameRegistry::new(true);
        let kept = reg.register("ENGINE_PAR_VOLUME", "$", true).unwrap();
        assert_eq!(kept.body, "ENGINE_PAR_VOLUME");
        let short = reg.register("my_local", "$", false).unwrap();
        assert_eq!(short.body.len(), 5);
    }

    #[test]
    fn test_reset_allows_reregistration() {
        let mut reg = NameRegistry::new(false);
        reg.register("x", "$", false).unwrap();
        reg.reset();
        assert!(reg.register("x", "$", false).is_ok());
    }
}
