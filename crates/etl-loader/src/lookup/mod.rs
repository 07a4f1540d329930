//! Generated lookup vocabulary
//!
//! Lookup-bearing fields name controlled-vocabulary entries by their display
//! name. While rows are loaded, [`LookupHandler`] records each `(code, name)`
//! pair and, for target lookups, each `(source code, target code)` relationship
//! pair. [`LookupHandler::commit`] then creates whatever the store lacks.

mod cache;
mod descriptor;
mod handler;

pub use cache::{CacheStats, LookupCache};
pub use descriptor::{LookupDescriptor, LookupRelationshipDescriptor};
pub use handler::{CommitSummary, LookupHandler};

use once_cell::sync::Lazy;
use regex::Regex;

static NON_CODE: Lazy<Regex> = Lazy::new(|| Regex::new("[^A-Z0-9]+").expect("valid regex"));

/// Lookup code for a display name
///
/// Uppercases, then collapses every run of characters outside `[A-Z0-9]` into a
/// single underscore. Idempotent: `get_code(&get_code(x)) == get_code(x)`.
#[must_use]
pub fn get_code(name: &str) -> String {
    NON_CODE.replace_all(&name.to_uppercase(), "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn codes() {
        assert_eq!(get_code("Golden Retriever"), "GOLDEN_RETRIEVER");
        assert_eq!(get_code("Golden Retriever!"), "GOLDEN_RETRIEVER_");
        assert_eq!(get_code("GOLDEN_RETRIEVER_"), "GOLDEN_RETRIEVER_");
        assert_eq!(get_code("  cat -- domestic "), "_CAT_DOMESTIC_");
        assert_eq!(get_code("k9"), "K9");
    }

    proptest! {
        #[test]
        fn code_is_idempotent(name in "\\PC{0,40}") {
            let code = get_code(&name);
            prop_assert_eq!(get_code(&code), code);
        }

        #[test]
        fn code_uses_code_alphabet(name in "\\PC{0,40}") {
            let code = get_code(&name);
            prop_assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!code.contains("__"));
        }

        #[test]
        fn code_is_deterministic(name in "[a-zA-Z !-]{0,20}") {
            prop_assert_eq!(get_code(&name), get_code(&name));
        }
    }
}
