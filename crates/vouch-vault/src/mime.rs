//! Per-attribute MIME side table.
//!
//! Entries live inside the credential record itself, so they are written in
//! the same atomic insert as the credential and vanish with it on delete.
//! They are set once at materialization and never modified.

use std::collections::BTreeMap;

use vouch_core::AttributeEntry;

use crate::error::{VaultError, VaultResult};

/// Attribute name → MIME type.
pub type MimeTypes = BTreeMap<String, String>;

/// Loose `type/subtype` check. Parameters after `;` are allowed.
pub fn validate_mime_type(attribute: &str, mime: &str) -> VaultResult<()> {
    let invalid = |reason: &str| VaultError::InvalidMimeType {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    };
    let essence = mime.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        return Err(invalid("empty"));
    }
    let (kind, subtype) = essence
        .split_once('/')
        .ok_or_else(|| invalid("missing '/'"))?;
    if kind.is_empty() || subtype.is_empty() {
        return Err(invalid("empty type or subtype"));
    }
    if essence.chars().any(char::is_whitespace) {
        return Err(invalid("whitespace in type"));
    }
    Ok(())
}

/// Record MIME types on freshly materialized attributes.
///
/// Every override must name an attribute of the credential. Nothing is
/// modified unless all overrides are valid.
pub fn attach_mime_types(
    attributes: &mut BTreeMap<String, AttributeEntry>,
    overrides: &MimeTypes,
) -> VaultResult<()> {
    for (name, mime) in overrides {
        if !attributes.contains_key(name) {
            return Err(VaultError::UnknownAttribute(name.clone()));
        }
        validate_mime_type(name, mime)?;
    }
    for (name, mime) in overrides {
        if let Some(entry) = attributes.get_mut(name) {
            entry.mime_type = Some(mime.trim().to_string());
        }
    }
    Ok(())
}
