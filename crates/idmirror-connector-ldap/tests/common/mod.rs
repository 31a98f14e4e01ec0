//! Integration test helpers for idmirror-connector-ldap.
//!
//! Provides an in-memory directory that evaluates LDAP filters, a scripted
//! directory that ignores them, and entry fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex, Once};

use idmirror_cache::{CacheStore, GroupRecord, InMemoryCache, MemberType, UserRecord};
use idmirror_connector::prelude::*;
use idmirror_connector_ldap::Initgroups;

static INIT: Once = Once::new();

pub const PEOPLE: &str = "ou=people,dc=example,dc=com";
pub const GROUPS: &str = "ou=groups,dc=example,dc=com";

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

pub fn user_dn(uid: &str) -> String {
    format!("uid={},{}", uid, PEOPLE)
}

pub fn group_dn(cn: &str) -> String {
    format!("cn={},{}", cn, GROUPS)
}

/// POSIX account with uid, uidNumber and gidNumber.
pub fn user(uid: &str, uid_number: u32, gid_number: u32) -> RawEntry {
    RawEntry::new(user_dn(uid))
        .with("objectClass", "top")
        .with("objectClass", "posixAccount")
        .with("uid", uid)
        .with("uidNumber", uid_number.to_string())
        .with("gidNumber", gid_number.to_string())
}

/// POSIX group with an optional gidNumber.
pub fn group(cn: &str, gid_number: Option<u32>) -> RawEntry {
    let entry = RawEntry::new(group_dn(cn))
        .with("objectClass", "top")
        .with("objectClass", "posixGroup")
        .with("cn", cn);
    match gid_number {
        Some(gid) => entry.with("gidNumber", gid.to_string()),
        None => entry,
    }
}

/// FreeIPA user group.
pub fn ipa_group(cn: &str, gid_number: u32) -> RawEntry {
    group(cn, Some(gid_number)).with("objectClass", "ipaUserGroup")
}

pub fn options(schema: SchemaVariant) -> InitgroupsOptions {
    InitgroupsOptions::new(schema)
        .with_user_search_base(SearchBase::new(PEOPLE))
        .with_group_search_base(SearchBase::new(GROUPS))
}

pub fn engine(
    directory: Arc<dyn DirectoryTransport>,
    cache: Arc<InMemoryCache>,
    options: InitgroupsOptions,
) -> Initgroups {
    init_test_logging();
    Initgroups::new(directory, cache, options).expect("valid options")
}

/// Seed the cache with a user and a stale parent group.
pub fn seed_stale_membership(cache: &InMemoryCache, user: &str, stale: &str) {
    let mut tx = cache.begin().unwrap();
    tx.store_user(UserRecord::new(user).with_ids(Some(1000), Some(100)))
        .unwrap();
    tx.store_group(GroupRecord::new(stale, 999)).unwrap();
    tx.replace_membership_edges(user, MemberType::User, &[stale.to_string()], &[])
        .unwrap();
    tx.commit().unwrap();
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// --- Filter evaluation ---

#[derive(Debug)]
enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Present(String),
    Equals(String, String),
}

struct FilterParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> FilterParser<'a> {
    fn parse(filter: &'a str) -> Expr {
        let mut parser = FilterParser {
            input: filter.as_bytes(),
            pos: 0,
        };
        let expr = parser.expr();
        assert_eq!(parser.pos, parser.input.len(), "trailing input in filter {}", filter);
        expr
    }

    fn expect(&mut self, byte: u8) {
        assert_eq!(self.input[self.pos], byte, "unexpected filter byte at {}", self.pos);
        self.pos += 1;
    }

    fn expr(&mut self) -> Expr {
        self.expect(b'(');
        let expr = match self.input[self.pos] {
            b'&' => {
                self.pos += 1;
                Expr::And(self.list())
            }
            b'|' => {
                self.pos += 1;
                Expr::Or(self.list())
            }
            b'!' => {
                self.pos += 1;
                Expr::Not(Box::new(self.expr()))
            }
            _ => self.item(),
        };
        self.expect(b')');
        expr
    }

    fn list(&mut self) -> Vec<Expr> {
        let mut items = Vec::new();
        while self.input[self.pos] == b'(' {
            items.push(self.expr());
        }
        items
    }

    fn item(&mut self) -> Expr {
        let start = self.pos;
        while self.input[self.pos] != b'=' {
            self.pos += 1;
        }
        let name = String::from_utf8(self.input[start..self.pos].to_vec()).unwrap();
        self.pos += 1;

        let start = self.pos;
        while self.input[self.pos] != b')' {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        if raw == b"*" {
            return Expr::Present(name);
        }
        Expr::Equals(name, unescape(raw))
    }
}

fn unescape(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap()
}

fn values(entry: &RawEntry, name: &str) -> Vec<String> {
    entry
        .get(name)
        .map(|vals| {
            vals.iter()
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn eval(expr: &Expr, entry: &RawEntry) -> bool {
    match expr {
        Expr::And(items) => items.iter().all(|e| eval(e, entry)),
        Expr::Or(items) => items.iter().any(|e| eval(e, entry)),
        Expr::Not(inner) => !eval(inner, entry),
        Expr::Present(name) => entry.get(name).is_some_and(|v| !v.is_empty()),
        Expr::Equals(name, value) => values(entry, name)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value)),
    }
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    let dn = dn.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();
    let suffix = format!(",{}", base);
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => dn
            .strip_suffix(&suffix)
            .is_some_and(|rdn| !rdn.contains(',')),
        SearchScope::Subtree => dn == base || dn.ends_with(&suffix),
    }
}

/// Directory held in memory, answering searches by evaluating the filter.
#[derive(Default)]
pub struct MockDirectory {
    entries: Vec<RawEntry>,
    dereference: bool,
    fail_on: Option<String>,
    requests: Mutex<Vec<SearchRequest>>,
    deref_requests: Mutex<Vec<DereferenceRequest>>,
}

impl MockDirectory {
    pub fn new(entries: Vec<RawEntry>) -> Self {
        Self {
            entries,
            ..Default::default()
        }
    }

    /// Advertise and answer dereference searches.
    pub fn with_dereference(mut self) -> Self {
        self.dereference = true;
        self
    }

    /// Fail every search whose filter contains `fragment`.
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn deref_requests(&self) -> Vec<DereferenceRequest> {
        self.deref_requests.lock().unwrap().clone()
    }

    /// Number of searches whose filter contains `fragment`.
    pub fn searches_containing(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.filter.contains(fragment))
            .count()
    }

    fn find(&self, dn: &str) -> Option<&RawEntry> {
        self.entries.iter().find(|e| e.dn.eq_ignore_ascii_case(dn))
    }
}

#[async_trait]
impl DirectoryTransport for MockDirectory {
    async fn search(&self, request: &SearchRequest) -> ConnectorResult<Vec<RawEntry>> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(fragment) = &self.fail_on {
            if request.filter.contains(fragment.as_str()) {
                return Err(ConnectorError::search_failed(&request.base, "server unavailable"));
            }
        }

        let expr = FilterParser::parse(&request.filter);
        Ok(self
            .entries
            .iter()
            .filter(|e| in_scope(&e.dn, &request.base, request.scope))
            .filter(|e| eval(&expr, e))
            .cloned()
            .collect())
    }

    fn supports_dereference(&self) -> bool {
        self.dereference
    }

    async fn dereference_search(
        &self,
        request: &DereferenceRequest,
    ) -> ConnectorResult<Vec<RawEntry>> {
        if !self.dereference {
            return Err(ConnectorError::DereferenceUnsupported);
        }
        self.deref_requests.lock().unwrap().push(request.clone());

        let Some(base) = self.find(&request.base_dn) else {
            return Ok(Vec::new());
        };
        Ok(values(base, &request.deref_attribute)
            .iter()
            .filter_map(|dn| self.find(dn))
            .cloned()
            .collect())
    }
}

/// Directory answering by filter fragment, whatever the filter says.
#[derive(Default)]
pub struct ScriptedDirectory {
    rules: Vec<(String, Vec<RawEntry>)>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer searches whose filter contains `fragment` with `entries`.
    pub fn on(mut self, fragment: impl Into<String>, entries: Vec<RawEntry>) -> Self {
        self.rules.push((fragment.into(), entries));
        self
    }
}

#[async_trait]
impl DirectoryTransport for ScriptedDirectory {
    async fn search(&self, request: &SearchRequest) -> ConnectorResult<Vec<RawEntry>> {
        Ok(self
            .rules
            .iter()
            .find(|(fragment, _)| request.filter.contains(fragment.as_str()))
            .map(|(_, entries)| entries.clone())
            .unwrap_or_default())
    }
}

#[test]
fn test_mock_filter_evaluation() {
    let entry = group("admins", Some(500)).with("memberUid", "alice");
    let matches = |filter: &str| eval(&FilterParser::parse(filter), &entry);

    assert!(matches("(&(memberUid=alice)(objectClass=posixGroup)(cn=*))"));
    assert!(matches("(&(gidNumber=*)(!(gidNumber=0)))"));
    assert!(matches("(|(cn=nobody)(CN=ADMINS))"));
    assert!(!matches("(memberUid=bob)"));
    assert!(!matches("(description=*)"));
    assert!(matches("(cn=adm\\69ns)"));
}

#[test]
fn test_mock_scope() {
    let dn = group_dn("admins");
    assert!(in_scope(&dn, GROUPS, SearchScope::Subtree));
    assert!(in_scope(&dn, GROUPS, SearchScope::OneLevel));
    assert!(!in_scope(&dn, GROUPS, SearchScope::Base));
    assert!(in_scope(&dn, &dn, SearchScope::Base));
    assert!(in_scope(&dn, "dc=example,dc=com", SearchScope::Subtree));
    assert!(!in_scope(&dn, "dc=example,dc=com", SearchScope::OneLevel));
}
