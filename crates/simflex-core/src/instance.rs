//! Instance identifiers and instance list records.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel value the front-end uses for an unsaved instance.
const NEW_SENTINEL: &str = "new";

/// Identifier of an instance saved on the server.
///
/// Ids are opaque server tokens (the generator produces 8-character hashes).
/// They are embedded quoted inside wire commands, so quotes and line breaks
/// are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Validate and wrap a server-side instance id.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(ClientError::InvalidInstanceId {
                value,
                message: "id is empty".into(),
            });
        }
        if value.eq_ignore_ascii_case(NEW_SENTINEL) {
            return Err(ClientError::InvalidInstanceId {
                value,
                message: "\"new\" is reserved for the unsaved instance".into(),
            });
        }
        if value.contains('"') || value.contains('\n') {
            return Err(ClientError::InvalidInstanceId {
                value,
                message: "id may not contain quotes or line breaks".into(),
            });
        }
        Ok(InstanceId(value))
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target of an instance operation: either the local unsaved template or a
/// saved server-side instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceSelector {
    /// The blank, not-yet-generated instance. Operations on it never touch
    /// the network.
    New,
    /// An instance saved on the server.
    Saved(InstanceId),
}

impl InstanceSelector {
    /// Parse a user-facing selector: the literal `new` maps to the blank
    /// template, anything else must be a valid saved id.
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case(NEW_SENTINEL) {
            Ok(InstanceSelector::New)
        } else {
            Ok(InstanceSelector::Saved(InstanceId::new(value)?))
        }
    }
}

/// One record of the server's instance list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Server-side id of the instance.
    pub hash: String,
    /// Optional human-readable title (may be empty).
    pub label: String,
}

impl InstanceRecord {
    /// Label shown in a selection list: `"<hash> - <label>"`, or just the
    /// hash when the instance has no title.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            self.hash.clone()
        } else {
            format!("{} - {}", self.hash, self.label)
        }
    }
}

/// Parse the body of a `list generated instances` reply.
///
/// The body is a `\n`-separated sequence of `id;label` records; an empty body
/// means no instances exist. Labels may be empty (trailing `;`).
pub fn parse_instance_list(body: &str) -> Vec<InstanceRecord> {
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n')
        .map(|line| {
            let mut parts = line.splitn(2, ';');
            let hash = parts.next().unwrap_or("").to_string();
            let label = parts.next().unwrap_or("").to_string();
            InstanceRecord { hash, label }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_rejects_sentinel_and_quotes() {
        assert!(InstanceId::new("new").is_err());
        assert!(InstanceId::new("NEW").is_err());
        assert!(InstanceId::new("").is_err());
        assert!(InstanceId::new("ab\"12").is_err());
        assert!(InstanceId::new("ab12cd34").is_ok());
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(InstanceSelector::parse("new").unwrap(), InstanceSelector::New);
        let saved = InstanceSelector::parse("ab12cd34").unwrap();
        assert_eq!(
            saved,
            InstanceSelector::Saved(InstanceId::new("ab12cd34").unwrap())
        );
    }

    #[test]
    fn test_parse_list_two_records() {
        let records = parse_instance_list("abc;Label\nxyz;");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].display_label(), "abc - Label");
        assert_eq!(records[1].display_label(), "xyz");
    }

    #[test]
    fn test_parse_list_empty_body() {
        assert!(parse_instance_list("").is_empty());
    }

    #[test]
    fn test_parse_list_label_containing_separator() {
        let records = parse_instance_list("abc;one;two");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, "abc");
        assert_eq!(records[0].label, "one;two");
    }
}
