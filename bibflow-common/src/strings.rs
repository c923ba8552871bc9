//! String macro resolution
//!
//! Field values may reference `@string` definitions as `#name#`. Resolution is a
//! single left-to-right pass: substituted text is never scanned again, so cyclic
//! definitions terminate.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static MACRO_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([^#]+)#").expect("macro reference pattern is valid"));

/// Expand every `#token#` whose token is defined in `symbols`
///
/// Tokens are case-sensitive. Undefined references stay verbatim.
pub fn resolve(value: &str, symbols: &BTreeMap<String, String>) -> String {
    if !has_reference(value) {
        return value.to_string();
    }
    MACRO_REFERENCE
        .replace_all(value, |caps: &Captures| match symbols.get(&caps[1]) {
            Some(expansion) => expansion.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// True when `value` contains at least one `#token#` reference
pub fn has_reference(value: &str) -> bool {
    MACRO_REFERENCE.is_match(value)
}
