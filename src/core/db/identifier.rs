/// Identifier Sanitization
///
/// Table and column names are the only caller input ever interpolated into
/// generated SQL, so they are reduced to `[A-Za-z0-9_]` first. Values are
/// never interpolated; they are always bound as parameters.
use crate::core::{Result, TxsqlError};
use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("identifier pattern is valid"));

/// Strips every character outside `[A-Za-z0-9_]`.
pub fn sanitize_identifier(identifier: &str) -> String {
    DISALLOWED.replace_all(identifier, "").into_owned()
}

/// Sanitizes `identifier`, rejecting it when nothing survives.
pub fn require_identifier(identifier: &str) -> Result<String> {
    let clean = sanitize_identifier(identifier);
    if clean.is_empty() {
        return Err(TxsqlError::Validation(format!(
            "identifier '{}' is empty after sanitization",
            identifier
        )));
    }
    Ok(clean)
}

/// Sanitizes every identifier in `identifiers`, failing on the first one that empties.
pub fn require_identifiers<S: AsRef<str>>(identifiers: &[S]) -> Result<Vec<String>> {
    identifiers.iter().map(|i| require_identifier(i.as_ref())).collect()
}
