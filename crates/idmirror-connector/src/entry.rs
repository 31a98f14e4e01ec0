//! Directory entries
//!
//! [`RawEntry`] is what a transport hands back for one search result, keyed by
//! the remote attribute names. [`DirectoryEntry`] is the parsed form keyed by
//! internal attribute names (see [`attr`]) and always carrying the original DN.

use std::collections::{BTreeMap, HashMap};

use crate::error::{ConnectorError, ConnectorResult};

/// Internal attribute names used after an entry has been parsed.
pub mod attr {
    /// Distinguished name the entry was fetched under.
    pub const ORIG_DN: &str = "originalDN";
    pub const NAME: &str = "name";
    pub const UID_NUMBER: &str = "uidNumber";
    pub const GID_NUMBER: &str = "gidNumber";
    /// Member references held by a group.
    pub const MEMBER: &str = "member";
    /// Parent references held by a user or group.
    pub const MEMBER_OF: &str = "memberOf";
    pub const OBJECT_CLASS: &str = "objectClass";
}

/// One search result as returned by a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl RawEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Builder: add a string value to an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs
            .entry(name.into())
            .or_default()
            .push(value.into().into_bytes());
        self
    }

    /// Builder: add raw values to an attribute.
    pub fn with_bytes(mut self, name: impl Into<String>, values: Vec<Vec<u8>>) -> Self {
        self.attrs.entry(name.into()).or_default().extend(values);
        self
    }

    /// Look up an attribute by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }
}

/// Attribute bag with byte-string values keyed by internal attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    attrs: BTreeMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry carrying only its original DN.
    pub fn with_dn(dn: impl Into<String>) -> Self {
        let mut entry = Self::new();
        entry.set(attr::ORIG_DN, vec![dn.into().into_bytes()]);
        entry
    }

    /// Replace all values of an attribute.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<Vec<u8>>) {
        self.attrs.insert(name.into(), values);
    }

    /// Append one value to an attribute.
    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.attrs.entry(name.into()).or_default().push(value.into());
    }

    /// Builder: append a string value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_value(name, value.into().into_bytes());
        self
    }

    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.attrs.get(name).map(Vec::as_slice)
    }

    /// First value of an attribute as UTF-8, if present and valid.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// All UTF-8 values of an attribute. Non UTF-8 values are skipped.
    pub fn get_strings(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| std::str::from_utf8(v).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Numeric attribute. Absent yields `None`, an unparsable value is an error.
    pub fn get_u32(&self, name: &str) -> ConnectorResult<Option<u32>> {
        let Some(raw) = self.get(name).and_then(|values| values.first()) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(raw).map_err(|_| {
            ConnectorError::invalid_data(format!("attribute '{}' is not valid UTF-8", name))
        })?;
        text.trim().parse::<u32>().map(Some).map_err(|_| {
            ConnectorError::invalid_data(format!(
                "attribute '{}' has non-numeric value '{}'",
                name, text
            ))
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.attrs.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Check whether any value of `name` equals `value`, ignoring ASCII case.
    ///
    /// Used for DN cross-references, which directories compare case-insensitively.
    pub fn has_value_ignore_case(&self, name: &str, value: &str) -> bool {
        self.get_strings(name)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Vec<u8>>> {
        self.attrs.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// The DN this entry was fetched under.
    pub fn original_dn(&self) -> Option<&str> {
        self.get_str(attr::ORIG_DN)
    }

    /// Resolve the canonical name of the entry.
    ///
    /// A single name value is returned as is. With several values the one
    /// matching the RDN of the original DN wins.
    pub fn primary_name(&self) -> ConnectorResult<&str> {
        let names = self.get_strings(attr::NAME);
        match names.as_slice() {
            [] => Err(ConnectorError::malformed_entry(format!(
                "entry '{}' has no name attribute",
                self.original_dn().unwrap_or("<unknown>")
            ))),
            [single] => Ok(*single),
            many => {
                let dn = self.original_dn().ok_or_else(|| {
                    ConnectorError::malformed_entry("multi-valued name without an original DN")
                })?;
                let rdn = rdn_value(dn).ok_or_else(|| {
                    ConnectorError::malformed_entry(format!("cannot parse RDN of '{}'", dn))
                })?;
                many.iter()
                    .find(|n| n.eq_ignore_ascii_case(&rdn))
                    .copied()
                    .ok_or_else(|| {
                        ConnectorError::malformed_entry(format!(
                            "no name value of '{}' matches its RDN",
                            dn
                        ))
                    })
            }
        }
    }
}

/// Extract the value of the first RDN of a DN, undoing RFC 4514 escapes.
pub fn rdn_value(dn: &str) -> Option<String> {
    let (_, rest) = dn.split_once('=')?;
    let bytes = rest.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok());
                match (hex, bytes.get(i + 1)) {
                    (Some(byte), _) => {
                        out.push(byte);
                        i += 3;
                    }
                    (None, Some(&next)) => {
                        out.push(next);
                        i += 2;
                    }
                    (None, None) => return None,
                }
            }
            b',' | b'+' => break,
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    let value = String::from_utf8(out).ok()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
