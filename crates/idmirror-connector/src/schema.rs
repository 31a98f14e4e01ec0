//! Schema variants and attribute maps
//!
//! Directories encode group membership in one of several conventions. The
//! [`SchemaVariant`] names the convention and provides default
//! [`AttributeMap`]s, which translate remote attribute names into the
//! internal names of [`crate::entry::attr`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::entry::{attr, DirectoryEntry, RawEntry};
use crate::error::{ConnectorError, ConnectorResult};

/// Group membership convention of the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SchemaVariant {
    /// Groups list member user names (`memberUid`).
    Rfc2307,
    /// Groups list member DNs, groups may be members of groups.
    Rfc2307Bis,
    /// FreeIPA: users carry `memberOf`.
    IpaV1,
    /// Active Directory: users carry `memberOf`.
    Ad,
}

impl SchemaVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVariant::Rfc2307 => "rfc2307",
            SchemaVariant::Rfc2307Bis => "rfc2307bis",
            SchemaVariant::IpaV1 => "ipa",
            SchemaVariant::Ad => "ad",
        }
    }
}

impl FromStr for SchemaVariant {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rfc2307" => Ok(SchemaVariant::Rfc2307),
            "rfc2307bis" => Ok(SchemaVariant::Rfc2307Bis),
            "ipa" | "ipa_v1" => Ok(SchemaVariant::IpaV1),
            "ad" => Ok(SchemaVariant::Ad),
            _ => Err(ConnectorError::UnsupportedSchema {
                schema: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SchemaVariant {
    type Error = ConnectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVariant> for String {
    fn from(value: SchemaVariant) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translation from remote attribute names to internal ones for one kind of
/// object, plus the object class entries must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    pub object_class: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_object_class: Option<String>,

    /// Internal name to remote name. Several internal names may share one
    /// remote attribute.
    pub attributes: BTreeMap<String, String>,
}

impl AttributeMap {
    pub fn new(object_class: impl Into<String>) -> Self {
        Self {
            object_class: object_class.into(),
            alt_object_class: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_alt_object_class(mut self, object_class: impl Into<String>) -> Self {
        self.alt_object_class = Some(object_class.into());
        self
    }

    pub fn map(mut self, internal: impl Into<String>, remote: impl Into<String>) -> Self {
        self.attributes.insert(internal.into(), remote.into());
        self
    }

    /// Default user map for a schema variant.
    pub fn user_defaults(schema: SchemaVariant) -> Self {
        let map = match schema {
            SchemaVariant::Ad => AttributeMap::new("user").map(attr::NAME, "sAMAccountName"),
            _ => AttributeMap::new("posixAccount").map(attr::NAME, "uid"),
        }
        .map(attr::UID_NUMBER, "uidNumber")
        .map(attr::GID_NUMBER, "gidNumber");

        match schema {
            SchemaVariant::Rfc2307 => map,
            _ => map.map(attr::MEMBER_OF, "memberOf"),
        }
    }

    /// Default group map for a schema variant.
    pub fn group_defaults(schema: SchemaVariant) -> Self {
        match schema {
            SchemaVariant::Rfc2307 => AttributeMap::new("posixGroup")
                .map(attr::NAME, "cn")
                .map(attr::GID_NUMBER, "gidNumber")
                .map(attr::MEMBER, "memberUid"),
            SchemaVariant::Rfc2307Bis => AttributeMap::new("posixGroup")
                .with_alt_object_class("groupOfNames")
                .map(attr::NAME, "cn")
                .map(attr::GID_NUMBER, "gidNumber")
                .map(attr::MEMBER, "member")
                .map(attr::MEMBER_OF, "memberOf"),
            SchemaVariant::IpaV1 => AttributeMap::new("ipaUserGroup")
                .with_alt_object_class("posixGroup")
                .map(attr::NAME, "cn")
                .map(attr::GID_NUMBER, "gidNumber")
                .map(attr::MEMBER, "member")
                .map(attr::MEMBER_OF, "memberOf"),
            SchemaVariant::Ad => AttributeMap::new("group")
                .map(attr::NAME, "sAMAccountName")
                .map(attr::GID_NUMBER, "gidNumber")
                .map(attr::MEMBER, "member")
                .map(attr::MEMBER_OF, "memberOf"),
        }
    }

    /// Remote name of an internal attribute.
    pub fn remote(&self, internal: &str) -> Option<&str> {
        self.attributes.get(internal).map(String::as_str)
    }

    /// Remote name of an internal attribute that the map must define.
    pub fn require(&self, internal: &str) -> ConnectorResult<&str> {
        self.remote(internal).ok_or_else(|| {
            ConnectorError::invalid_configuration(format!(
                "attribute map for '{}' does not map '{}'",
                self.object_class, internal
            ))
        })
    }

    /// Remote attributes to request when searching with this map.
    pub fn request_attributes(&self) -> Vec<String> {
        let mut names = vec![attr::OBJECT_CLASS.to_string()];
        for remote in self.attributes.values() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(remote)) {
                names.push(remote.clone());
            }
        }
        names
    }

    /// Check whether a raw entry carries this map's object class.
    pub fn matches(&self, raw: &RawEntry) -> bool {
        let Some(classes) = raw.get(attr::OBJECT_CLASS) else {
            return false;
        };
        classes.iter().any(|oc| {
            let oc = String::from_utf8_lossy(oc);
            oc.eq_ignore_ascii_case(&self.object_class)
                || self
                    .alt_object_class
                    .as_deref()
                    .is_some_and(|alt| oc.eq_ignore_ascii_case(alt))
        })
    }

    pub fn validate(&self) -> ConnectorResult<()> {
        if self.object_class.trim().is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "attribute map object_class must not be empty",
            ));
        }
        self.require(attr::NAME)?;
        Ok(())
    }
}

/// Parse a raw entry.
///
/// With a map, the entry must carry the map's object class, mapped attributes
/// are renamed and unmapped ones dropped. Without a map every attribute is
/// kept under its remote name. The original DN is always recorded.
pub fn parse_entry(raw: &RawEntry, map: Option<&AttributeMap>) -> ConnectorResult<DirectoryEntry> {
    if raw.dn.trim().is_empty() {
        return Err(ConnectorError::malformed_entry("entry has no DN"));
    }

    let mut entry = DirectoryEntry::new();
    match map {
        Some(map) => {
            if !map.matches(raw) {
                return Err(ConnectorError::malformed_entry(format!(
                    "entry '{}' is not of object class '{}'",
                    raw.dn, map.object_class
                )));
            }
            for (internal, remote) in &map.attributes {
                if let Some(values) = raw.get(remote) {
                    entry.set(internal.clone(), values.to_vec());
                }
            }
        }
        None => {
            for (name, values) in &raw.attrs {
                entry.set(name.clone(), values.clone());
            }
        }
    }

    entry.set(attr::ORIG_DN, vec![raw.dn.clone().into_bytes()]);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_raw() -> RawEntry {
        RawEntry::new("cn=admins,ou=groups,dc=example,dc=com")
            .with("objectClass", "top")
            .with("objectClass", "posixGroup")
            .with("cn", "admins")
            .with("gidNumber", "500")
            .with("description", "Administrators")
    }

    #[test]
    fn test_schema_variant_parse() {
        assert_eq!("RFC2307".parse::<SchemaVariant>().unwrap(), SchemaVariant::Rfc2307);
        assert_eq!("rfc2307bis".parse::<SchemaVariant>().unwrap(), SchemaVariant::Rfc2307Bis);
        assert_eq!("ipa".parse::<SchemaVariant>().unwrap(), SchemaVariant::IpaV1);
        assert_eq!("ad".parse::<SchemaVariant>().unwrap(), SchemaVariant::Ad);
        assert!(matches!(
            "novell".parse::<SchemaVariant>(),
            Err(ConnectorError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn test_parse_entry_with_map() {
        let map = AttributeMap::group_defaults(SchemaVariant::Rfc2307);
        let entry = parse_entry(&group_raw(), Some(&map)).unwrap();

        assert_eq!(entry.get_str(attr::NAME), Some("admins"));
        assert_eq!(entry.get_u32(attr::GID_NUMBER).unwrap(), Some(500));
        assert_eq!(
            entry.original_dn(),
            Some("cn=admins,ou=groups,dc=example,dc=com")
        );
        // unmapped attributes are dropped
        assert!(!entry.has("description"));
        assert!(!entry.has("cn"));
    }

    #[test]
    fn test_parse_entry_duplicate_mapping() {
        let map = AttributeMap::new("posixGroup")
            .map(attr::NAME, "cn")
            .map("displayName", "cn");
        let entry = parse_entry(&group_raw(), Some(&map)).unwrap();
        assert_eq!(entry.get_str(attr::NAME), Some("admins"));
        assert_eq!(entry.get_str("displayName"), Some("admins"));
    }

    #[test]
    fn test_parse_entry_alt_object_class() {
        let map = AttributeMap::group_defaults(SchemaVariant::Rfc2307Bis);
        let raw = RawEntry::new("cn=g,dc=example,dc=com")
            .with("objectClass", "GroupOfNames")
            .with("cn", "g");
        assert!(parse_entry(&raw, Some(&map)).is_ok());
    }

    #[test]
    fn test_parse_entry_object_class_mismatch() {
        let map = AttributeMap::user_defaults(SchemaVariant::Rfc2307);
        assert!(matches!(
            parse_entry(&group_raw(), Some(&map)),
            Err(ConnectorError::MalformedEntry { .. })
        ));

        let no_oc = RawEntry::new("cn=x,dc=example,dc=com").with("cn", "x");
        assert!(parse_entry(&no_oc, Some(&map)).is_err());
    }

    #[test]
    fn test_parse_entry_without_dn() {
        let raw = RawEntry::new("").with("objectClass", "posixGroup");
        assert!(parse_entry(&raw, None).is_err());
    }

    #[test]
    fn test_parse_entry_without_map_keeps_everything() {
        let entry = parse_entry(&group_raw(), None).unwrap();
        assert_eq!(entry.get_str("description"), Some("Administrators"));
        assert_eq!(entry.get_strings("objectClass").len(), 2);
        assert!(entry.original_dn().is_some());
    }

    #[test]
    fn test_request_attributes() {
        let map = AttributeMap::group_defaults(SchemaVariant::Rfc2307Bis);
        let attrs = map.request_attributes();
        assert_eq!(attrs[0], "objectClass");
        assert!(attrs.contains(&"cn".to_string()));
        assert!(attrs.contains(&"member".to_string()));
        assert!(attrs.contains(&"gidNumber".to_string()));
    }

    #[test]
    fn test_default_maps_validate() {
        for schema in [
            SchemaVariant::Rfc2307,
            SchemaVariant::Rfc2307Bis,
            SchemaVariant::IpaV1,
            SchemaVariant::Ad,
        ] {
            assert!(AttributeMap::user_defaults(schema).validate().is_ok());
            assert!(AttributeMap::group_defaults(schema).validate().is_ok());
        }
        assert!(AttributeMap::user_defaults(SchemaVariant::Rfc2307)
            .remote(attr::MEMBER_OF)
            .is_none());
    }
}
