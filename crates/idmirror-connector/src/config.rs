//! Resolution configuration
//!
//! Search bases and the tunables of one initgroups engine instance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConnectorError, ConnectorResult};
use crate::schema::{AttributeMap, SchemaVariant};

/// Search scope of one search base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    Base,
    #[serde(alias = "one")]
    OneLevel,
    #[default]
    #[serde(alias = "sub")]
    Subtree,
}

impl FromStr for SearchScope {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "sub" | "subtree" => Ok(SearchScope::Subtree),
            "one" | "onelevel" => Ok(SearchScope::OneLevel),
            "base" => Ok(SearchScope::Base),
            other => Err(ConnectorError::invalid_configuration(format!(
                "unknown search scope '{}' (expected base, onelevel or subtree)",
                other
            ))),
        }
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchScope::Base => write!(f, "base"),
            SearchScope::OneLevel => write!(f, "onelevel"),
            SearchScope::Subtree => write!(f, "subtree"),
        }
    }
}

/// One configured search base: where to search, how deep, and an optional
/// filter ANDed to every search issued under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SearchBaseRepr")]
pub struct SearchBase {
    pub dn: String,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Accepts either the structured form or the `dn?scope?filter` shorthand.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchBaseRepr {
    Text(String),
    Full {
        dn: String,
        #[serde(default)]
        scope: SearchScope,
        #[serde(default)]
        filter: Option<String>,
    },
}

impl TryFrom<SearchBaseRepr> for SearchBase {
    type Error = ConnectorError;

    fn try_from(repr: SearchBaseRepr) -> Result<Self, Self::Error> {
        match repr {
            SearchBaseRepr::Text(text) => {
                let mut bases = SearchBase::parse_list(&text)?;
                if bases.len() != 1 {
                    return Err(ConnectorError::invalid_configuration(format!(
                        "expected exactly one search base in '{}'",
                        text
                    )));
                }
                Ok(bases.remove(0))
            }
            SearchBaseRepr::Full { dn, scope, filter } => Ok(SearchBase {
                dn,
                scope,
                filter: filter.map(|f| normalize_filter(&f)).filter(|f| !f.is_empty()),
            }),
        }
    }
}

impl SearchBase {
    /// Subtree search base without a sub-filter.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            scope: SearchScope::Subtree,
            filter: None,
        }
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(normalize_filter(&filter.into()));
        self
    }

    /// Parse the `dn?scope?filter[?dn?scope?filter...]` notation.
    ///
    /// A value without `?` is a single subtree base. Empty scope means
    /// subtree and an empty filter means none.
    pub fn parse_list(value: &str) -> ConnectorResult<Vec<SearchBase>> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "search base must not be empty",
            ));
        }

        let tokens: Vec<&str> = value.split('?').collect();
        let mut bases = Vec::new();
        for chunk in tokens.chunks(3) {
            let dn = chunk[0].trim();
            if dn.is_empty() {
                return Err(ConnectorError::invalid_configuration(format!(
                    "search base list '{}' contains an empty DN",
                    value
                )));
            }
            let scope = chunk
                .get(1)
                .map(|s| s.trim().parse::<SearchScope>())
                .transpose()?
                .unwrap_or_default();
            let filter = chunk
                .get(2)
                .map(|f| normalize_filter(f))
                .filter(|f| !f.is_empty());

            bases.push(SearchBase {
                dn: dn.to_string(),
                scope,
                filter,
            });
        }

        Ok(bases)
    }
}

/// Wrap a bare filter in parentheses.
fn normalize_filter(filter: &str) -> String {
    let filter = filter.trim();
    if filter.is_empty() || filter.starts_with('(') {
        filter.to_string()
    } else {
        format!("({})", filter)
    }
}

/// Tunables of the initgroups engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitgroupsOptions {
    /// Directory schema variant, selects the resolution strategy.
    pub schema: SchemaVariant,

    #[serde(default)]
    pub user_search_bases: Vec<SearchBase>,

    #[serde(default)]
    pub group_search_bases: Vec<SearchBase>,

    /// Timeout handed to the transport with every search.
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,

    /// Parent count above which a dereference search is preferred.
    #[serde(default = "default_deref_threshold")]
    pub deref_threshold: usize,

    /// Deepest group nesting level the bidirectional strategy expands.
    #[serde(default = "default_max_nesting_level")]
    pub max_nesting_level: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_map: Option<AttributeMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_map: Option<AttributeMap>,
}

fn default_search_timeout_secs() -> u64 {
    6
}

fn default_deref_threshold() -> usize {
    10
}

fn default_max_nesting_level() -> usize {
    2
}

impl InitgroupsOptions {
    pub fn new(schema: SchemaVariant) -> Self {
        Self {
            schema,
            user_search_bases: Vec::new(),
            group_search_bases: Vec::new(),
            search_timeout_secs: default_search_timeout_secs(),
            deref_threshold: default_deref_threshold(),
            max_nesting_level: default_max_nesting_level(),
            user_map: None,
            group_map: None,
        }
    }

    pub fn with_user_search_base(mut self, base: SearchBase) -> Self {
        self.user_search_bases.push(base);
        self
    }

    pub fn with_group_search_base(mut self, base: SearchBase) -> Self {
        self.group_search_bases.push(base);
        self
    }

    pub fn with_search_timeout_secs(mut self, secs: u64) -> Self {
        self.search_timeout_secs = secs;
        self
    }

    pub fn with_deref_threshold(mut self, threshold: usize) -> Self {
        self.deref_threshold = threshold;
        self
    }

    pub fn with_max_nesting_level(mut self, level: usize) -> Self {
        self.max_nesting_level = level;
        self
    }

    pub fn with_user_map(mut self, map: AttributeMap) -> Self {
        self.user_map = Some(map);
        self
    }

    pub fn with_group_map(mut self, map: AttributeMap) -> Self {
        self.group_map = Some(map);
        self
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    /// User attribute map in effect: the override or the schema default.
    pub fn user_map(&self) -> AttributeMap {
        self.user_map
            .clone()
            .unwrap_or_else(|| AttributeMap::user_defaults(self.schema))
    }

    /// Group attribute map in effect: the override or the schema default.
    pub fn group_map(&self) -> AttributeMap {
        self.group_map
            .clone()
            .unwrap_or_else(|| AttributeMap::group_defaults(self.schema))
    }

    /// Validate the options.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.user_search_bases.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "at least one user search base is required",
            ));
        }
        if self.group_search_bases.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "at least one group search base is required",
            ));
        }
        if let Some(base) = self
            .user_search_bases
            .iter()
            .chain(self.group_search_bases.iter())
            .find(|b| b.dn.trim().is_empty())
        {
            return Err(ConnectorError::invalid_configuration(format!(
                "search base with empty DN (scope {})",
                base.scope
            )));
        }
        if self.search_timeout_secs == 0 {
            return Err(ConnectorError::invalid_configuration(
                "search_timeout_secs must be greater than zero",
            ));
        }
        if let Some(map) = &self.user_map {
            map.validate()?;
        }
        if let Some(map) = &self.group_map {
            map.validate()?;
        }
        Ok(())
    }
}
