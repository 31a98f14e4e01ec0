//! Cached identity records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace of a membership edge's member side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    User,
    Group,
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::User => write!(f, "user"),
            MemberType::Group => write!(f, "group"),
        }
    }
}

/// A cached user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub uid: Option<u32>,
    /// Primary group id.
    pub gid: Option<u32>,
    pub original_dn: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: None,
            gid: None,
            original_dn: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_ids(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_original_dn(mut self, dn: impl Into<String>) -> Self {
        self.original_dn = Some(dn.into());
        self
    }
}

/// A cached group.
///
/// An incomplete record only exists to back membership edges until the group
/// is fetched in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    /// Numeric id, 0 for non-POSIX groups.
    pub gid: u32,
    pub original_dn: Option<String>,
    pub is_posix: bool,
    pub incomplete: bool,
    pub created_at: DateTime<Utc>,
}

impl GroupRecord {
    /// A fully fetched group. A gid of 0 marks it non-POSIX.
    pub fn new(name: impl Into<String>, gid: u32) -> Self {
        Self {
            name: name.into(),
            gid,
            original_dn: None,
            is_posix: gid != 0,
            incomplete: false,
            created_at: Utc::now(),
        }
    }

    /// Minimal placeholder record.
    pub fn incomplete(
        name: impl Into<String>,
        gid: u32,
        original_dn: Option<String>,
        is_posix: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            gid,
            original_dn,
            is_posix,
            incomplete: true,
            created_at,
        }
    }

    pub fn with_original_dn(mut self, dn: impl Into<String>) -> Self {
        self.original_dn = Some(dn.into());
        self
    }
}
