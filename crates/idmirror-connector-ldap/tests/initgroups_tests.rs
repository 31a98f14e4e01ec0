//! End-to-end initgroups resolution against in-memory directories.

mod common;

use std::sync::Arc;

use common::*;
use idmirror_cache::{InMemoryCache, MemberType};
use idmirror_connector::prelude::*;
use idmirror_connector_ldap::{ErrorClass, Initgroups, InitgroupsError, Strategy};

fn parents(cache: &InMemoryCache, name: &str, kind: MemberType) -> Vec<String> {
    let mut names = cache.direct_parents(name, kind).unwrap();
    names.sort();
    names
}

// --- Flat (RFC2307) ---

fn flat_directory() -> MockDirectory {
    MockDirectory::new(vec![
        user("alice", 1000, 100),
        group("users", Some(100)),
        group("admins", Some(500)).with("memberUid", "alice"),
        group("devs", Some(600)).with("memberUid", "bob"),
        group("zero", Some(0)).with("memberUid", "alice"),
        group("nogid", None).with("memberUid", "alice"),
    ])
}

#[tokio::test]
async fn test_flat_resolves_member_uid_groups() {
    let directory = Arc::new(flat_directory());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory.clone(), cache.clone(), options(SchemaVariant::Rfc2307));
    assert_eq!(engine.strategy(), Strategy::Flat);

    engine.initgroups("alice").await.unwrap();

    let alice = cache.user("alice").unwrap().unwrap();
    assert_eq!(alice.uid, Some(1000));
    assert_eq!(alice.gid, Some(100));
    assert_eq!(alice.original_dn.as_deref(), Some(user_dn("alice").as_str()));

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["admins"]));

    let admins = cache.group("admins").unwrap().unwrap();
    assert!(admins.incomplete);
    assert!(admins.is_posix);
    assert_eq!(admins.gid, 500);

    assert!(cache.group("zero").unwrap().is_none());
    assert!(cache.group("nogid").unwrap().is_none());
    assert!(cache.group("devs").unwrap().is_none());

    let users = cache.group("users").unwrap().unwrap();
    assert!(!users.incomplete);
    assert_eq!(users.gid, 100);

    assert_eq!(cache.initgroups("alice").unwrap(), names(&["admins", "users"]));
    assert_eq!(
        directory.searches_containing("(memberUid=alice)"),
        1,
        "one group search per base"
    );
}

#[tokio::test]
async fn test_flat_placeholders_for_groups_without_gid() {
    let directory = Arc::new(
        ScriptedDirectory::new()
            .on("(uid=alice)", vec![user("alice", 1000, 100)])
            .on(
                "(memberUid=alice)",
                vec![group("admins", Some(500)), group("legacy", None)],
            ),
    );
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory, cache.clone(), options(SchemaVariant::Rfc2307));

    engine.initgroups("alice").await.unwrap();

    assert_eq!(
        parents(&cache, "alice", MemberType::User),
        names(&["admins", "legacy"])
    );

    let legacy = cache.group("legacy").unwrap().unwrap();
    assert_eq!(legacy.gid, 0);
    assert!(!legacy.is_posix);
    assert!(legacy.incomplete);

    let admins = cache.group("admins").unwrap().unwrap();
    assert_eq!(admins.gid, 500);
    assert!(admins.is_posix);
}

#[tokio::test]
async fn test_flat_removes_stale_membership() {
    let cache = Arc::new(InMemoryCache::new());
    seed_stale_membership(&cache, "alice", "old");

    let engine = engine(
        Arc::new(flat_directory()),
        cache.clone(),
        options(SchemaVariant::Rfc2307),
    );
    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["admins"]));
    assert!(cache.group("old").unwrap().is_some(), "groups are never deleted");
}

#[tokio::test]
async fn test_flat_second_run_changes_nothing() {
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(
        Arc::new(flat_directory()),
        cache.clone(),
        options(SchemaVariant::Rfc2307),
    );

    engine.initgroups("alice").await.unwrap();
    let alice = cache.user("alice").unwrap().unwrap();
    let admins = cache.group("admins").unwrap().unwrap();

    engine.initgroups("alice").await.unwrap();
    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["admins"]));
    assert_eq!(cache.user("alice").unwrap().unwrap().created_at, alice.created_at);
    assert_eq!(cache.group("admins").unwrap().unwrap(), admins);
}

#[tokio::test]
async fn test_flat_honours_search_base_filter() {
    let directory = MockDirectory::new(vec![
        user("alice", 1000, 100),
        group("admins", Some(500)).with("memberUid", "alice"),
        group("ops", Some(700)).with("memberUid", "alice"),
    ]);
    let cache = Arc::new(InMemoryCache::new());
    let options = InitgroupsOptions::new(SchemaVariant::Rfc2307)
        .with_user_search_base(SearchBase::new(PEOPLE))
        .with_group_search_base(SearchBase::new(GROUPS).with_filter("!(cn=admins)"));
    let engine = engine(Arc::new(directory), cache.clone(), options);

    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["ops"]));
}

// --- Direct attribute (FreeIPA) ---

fn ipa_directory() -> MockDirectory {
    MockDirectory::new(vec![
        user("alice", 1000, 100)
            .with("memberOf", group_dn("groupa"))
            .with("memberOf", group_dn("groupc"))
            .with("memberOf", group_dn("missing"))
            .with("memberOf", "cn=sysadmin,cn=roles,dc=example,dc=com"),
        ipa_group("staff", 100),
        ipa_group("groupa", 2001).with("member", user_dn("alice")),
        ipa_group("groupc", 2003).with("member", group_dn("groupa")),
        RawEntry::new("cn=sysadmin,cn=roles,dc=example,dc=com")
            .with("objectClass", "nsRoleDefinition")
            .with("cn", "sysadmin"),
    ])
}

fn assert_ipa_memberships(cache: &InMemoryCache) {
    assert_eq!(parents(cache, "alice", MemberType::User), names(&["groupa"]));
    assert_eq!(parents(cache, "groupa", MemberType::Group), names(&["groupc"]));
    assert!(parents(cache, "groupc", MemberType::Group).is_empty());
    assert!(cache.group("missing").unwrap().is_none());
    assert!(cache.group("sysadmin").unwrap().is_none());
    assert_eq!(cache.initgroups("alice").unwrap(), names(&["groupa", "staff"]));
}

#[tokio::test]
async fn test_direct_attribute_looks_up_each_reference() {
    let directory = Arc::new(ipa_directory());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory.clone(), cache.clone(), options(SchemaVariant::IpaV1));
    assert_eq!(engine.strategy(), Strategy::NestedDirectAttribute);

    engine.initgroups("alice").await.unwrap();

    assert_ipa_memberships(&cache);
    let lookups = directory
        .requests()
        .iter()
        .filter(|r| r.scope == SearchScope::Base)
        .count();
    assert_eq!(lookups, 4);
    assert!(directory.deref_requests().is_empty());
}

#[tokio::test]
async fn test_direct_attribute_below_threshold_skips_dereference() {
    let directory = Arc::new(ipa_directory().with_dereference());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory.clone(), cache.clone(), options(SchemaVariant::IpaV1));

    engine.initgroups("alice").await.unwrap();

    assert_ipa_memberships(&cache);
    assert!(directory.deref_requests().is_empty());
}

#[tokio::test]
async fn test_direct_attribute_uses_dereference_above_threshold() {
    let directory = Arc::new(ipa_directory().with_dereference());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(
        directory.clone(),
        cache.clone(),
        options(SchemaVariant::IpaV1).with_deref_threshold(1),
    );

    engine.initgroups("alice").await.unwrap();

    assert_ipa_memberships(&cache);
    let derefs = directory.deref_requests();
    assert_eq!(derefs.len(), 1);
    assert_eq!(derefs[0].base_dn, user_dn("alice"));
    assert_eq!(derefs[0].deref_attribute, "memberOf");
    assert!(directory
        .requests()
        .iter()
        .all(|r| r.scope != SearchScope::Base));
}

#[tokio::test]
async fn test_direct_attribute_without_member_of_leaves_cache_alone() {
    let cache = Arc::new(InMemoryCache::new());
    seed_stale_membership(&cache, "alice", "old");

    let directory = MockDirectory::new(vec![user("alice", 1000, 100), ipa_group("staff", 100)]);
    let engine = engine(Arc::new(directory), cache.clone(), options(SchemaVariant::IpaV1));
    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["old"]));
}

// --- Bidirectional (RFC2307bis) ---

fn chain_directory() -> MockDirectory {
    MockDirectory::new(vec![
        user("alice", 1000, 100),
        group("staff", Some(100)),
        group("g1", Some(1001)).with("member", user_dn("alice")),
        group("g2", Some(1002)).with("member", group_dn("g1")),
        group("g3", Some(1003)).with("member", group_dn("g2")),
        group("g4", Some(1004)).with("member", group_dn("g3")),
        group("g5", Some(1005)).with("member", group_dn("g4")),
    ])
}

fn member_filter(dn: &str) -> String {
    format!("(member={})", dn)
}

#[tokio::test]
async fn test_bidirectional_stops_at_max_nesting() {
    let directory = Arc::new(chain_directory());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory.clone(), cache.clone(), options(SchemaVariant::Rfc2307Bis));
    assert_eq!(engine.strategy(), Strategy::NestedBidirectional);

    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["g1"]));
    assert_eq!(parents(&cache, "g1", MemberType::Group), names(&["g2"]));
    assert_eq!(parents(&cache, "g2", MemberType::Group), names(&["g3"]));
    assert_eq!(parents(&cache, "g3", MemberType::Group), names(&["g4"]));

    let g4 = cache.group("g4").unwrap().unwrap();
    assert!(g4.incomplete);
    assert!(parents(&cache, "g4", MemberType::Group).is_empty());
    assert!(cache.group("g5").unwrap().is_none());

    assert_eq!(directory.searches_containing(&member_filter(&group_dn("g3"))), 1);
    assert_eq!(directory.searches_containing(&member_filter(&group_dn("g4"))), 0);
}

#[tokio::test]
async fn test_bidirectional_second_run_changes_nothing() {
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(
        Arc::new(chain_directory()),
        cache.clone(),
        options(SchemaVariant::Rfc2307Bis),
    );
    let groups = ["staff", "g1", "g2", "g3", "g4"];
    let snapshot = |cache: &InMemoryCache| {
        let records: Vec<_> = groups
            .iter()
            .map(|name| cache.group(name).unwrap())
            .collect();
        let edges: Vec<_> = groups
            .iter()
            .map(|name| parents(cache, name, MemberType::Group))
            .collect();
        (
            cache.user("alice").unwrap(),
            parents(cache, "alice", MemberType::User),
            records,
            edges,
        )
    };

    engine.initgroups("alice").await.unwrap();
    let first = snapshot(cache.as_ref());
    let commits = cache.commits();

    engine.initgroups("alice").await.unwrap();
    let second = snapshot(cache.as_ref());

    assert_eq!(second, first);
    assert_eq!(second.1, names(&["g1"]));
    assert!(second.2.iter().all(Option::is_some));
    assert!(cache.group("g5").unwrap().is_none());
    assert!(cache.commits() > commits);
}

#[tokio::test]
async fn test_bidirectional_zero_nesting_keeps_direct_parents() {
    let directory = Arc::new(chain_directory());
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(
        directory.clone(),
        cache.clone(),
        options(SchemaVariant::Rfc2307Bis).with_max_nesting_level(0),
    );

    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "g1", MemberType::Group), names(&["g2"]));
    assert!(cache.group("g2").unwrap().is_some());
    assert!(cache.group("g3").unwrap().is_none());
    assert_eq!(directory.searches_containing(&member_filter(&group_dn("g2"))), 0);
}

#[tokio::test]
async fn test_bidirectional_cycle_terminates() {
    let directory = Arc::new(MockDirectory::new(vec![
        user("alice", 1000, 100),
        group("g1", Some(1001))
            .with("member", user_dn("alice"))
            .with("member", group_dn("g2")),
        group("g2", Some(1002)).with("member", group_dn("g1")),
    ]));
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory.clone(), cache.clone(), options(SchemaVariant::Rfc2307Bis));

    engine.initgroups("alice").await.unwrap();

    assert_eq!(parents(&cache, "alice", MemberType::User), names(&["g1"]));
    assert_eq!(parents(&cache, "g1", MemberType::Group), names(&["g2"]));
    assert_eq!(parents(&cache, "g2", MemberType::Group), names(&["g1"]));
    assert_eq!(directory.searches_containing(&member_filter(&group_dn("g1"))), 1);
    assert_eq!(directory.searches_containing(&member_filter(&group_dn("g2"))), 1);
}

#[tokio::test]
async fn test_bidirectional_without_groups_clears_memberships() {
    let cache = Arc::new(InMemoryCache::new());
    seed_stale_membership(&cache, "alice", "old");

    let directory = MockDirectory::new(vec![user("alice", 1000, 100), group("staff", Some(100))]);
    let engine = engine(Arc::new(directory), cache.clone(), options(SchemaVariant::Rfc2307Bis));
    engine.initgroups("alice").await.unwrap();

    assert!(parents(&cache, "alice", MemberType::User).is_empty());
    assert_eq!(cache.initgroups("alice").unwrap(), names(&["staff"]));
}

#[tokio::test]
async fn test_bidirectional_search_failure_writes_no_groups() {
    let directory = Arc::new(chain_directory().failing_on(member_filter(&group_dn("g2"))));
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(directory, cache.clone(), options(SchemaVariant::Rfc2307Bis));

    let err = engine.initgroups("alice").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Directory);

    assert!(cache.user("alice").unwrap().is_some());
    assert!(cache.group("g1").unwrap().is_none());
    assert!(parents(&cache, "alice", MemberType::User).is_empty());
}

// --- User lookup and failures ---

#[tokio::test]
async fn test_unknown_user() {
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(
        Arc::new(flat_directory()),
        cache.clone(),
        options(SchemaVariant::Rfc2307),
    );

    let err = engine.initgroups("mallory").await.unwrap_err();
    assert!(matches!(err, InitgroupsError::UserNotFound { ref name } if name == "mallory"));
    assert_eq!(cache.commits(), 0);
}

#[tokio::test]
async fn test_duplicate_user_is_invalid_state() {
    let directory = MockDirectory::new(vec![
        user("alice", 1000, 100),
        RawEntry::new(format!("uid=alice,ou=contractors,{}", PEOPLE))
            .with("objectClass", "posixAccount")
            .with("uid", "alice")
            .with("uidNumber", "5000")
            .with("gidNumber", "100"),
    ]);
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(Arc::new(directory), cache.clone(), options(SchemaVariant::Rfc2307));

    let err = engine.initgroups("alice").await.unwrap_err();
    assert!(matches!(err, InitgroupsError::InvalidState { .. }));
    assert!(cache.user("alice").unwrap().is_none());
}

#[tokio::test]
async fn test_user_found_under_second_base() {
    let directory = Arc::new(flat_directory());
    let cache = Arc::new(InMemoryCache::new());
    let options = InitgroupsOptions::new(SchemaVariant::Rfc2307)
        .with_user_search_base(SearchBase::new("ou=contractors,dc=example,dc=com"))
        .with_user_search_base(SearchBase::new(PEOPLE))
        .with_group_search_base(SearchBase::new(GROUPS));
    let engine = engine(directory.clone(), cache.clone(), options);

    engine.initgroups("alice").await.unwrap();

    assert_eq!(directory.searches_containing("(uid=alice)"), 2);
    assert!(cache.user("alice").unwrap().is_some());
}

#[tokio::test]
async fn test_user_without_gid_is_invalid_state() {
    let directory = MockDirectory::new(vec![RawEntry::new(user_dn("alice"))
        .with("objectClass", "posixAccount")
        .with("uid", "alice")
        .with("uidNumber", "1000")]);
    let cache = Arc::new(InMemoryCache::new());
    let engine = engine(Arc::new(directory), cache, options(SchemaVariant::Rfc2307));

    let err = engine.initgroups("alice").await.unwrap_err();
    assert!(matches!(err, InitgroupsError::InvalidState { .. }));
    assert_eq!(err.class(), ErrorClass::InvalidState);
}

#[tokio::test]
async fn test_commit_failure_leaves_cache_untouched() {
    let cache = Arc::new(InMemoryCache::new());
    cache.fail_next_commit();
    let engine = engine(
        Arc::new(flat_directory()),
        cache.clone(),
        options(SchemaVariant::Rfc2307),
    );

    let err = engine.initgroups("alice").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Cache);
    assert!(cache.user("alice").unwrap().is_none());
    assert_eq!(cache.commits(), 0);
}

// --- Configuration ---

#[test]
fn test_missing_group_base_is_configuration_error() {
    let options = InitgroupsOptions::new(SchemaVariant::Rfc2307)
        .with_user_search_base(SearchBase::new(PEOPLE));
    let err = Initgroups::new(
        Arc::new(flat_directory()),
        Arc::new(InMemoryCache::new()),
        options,
    )
    .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Configuration);
}

#[test]
fn test_unsupported_schema_is_rejected() {
    let result: Result<InitgroupsOptions, _> = serde_json::from_str(
        r#"{"schema": "novell", "user_search_bases": ["ou=people,dc=example,dc=com"]}"#,
    );
    assert!(result.is_err());

    let options: InitgroupsOptions = serde_json::from_str(
        r#"{
            "schema": "rfc2307bis",
            "user_search_bases": ["ou=people,dc=example,dc=com?one"],
            "group_search_bases": ["ou=groups,dc=example,dc=com?sub?(!(cn=nobody))"]
        }"#,
    )
    .unwrap();
    assert_eq!(options.user_search_bases[0].scope, SearchScope::OneLevel);
    assert_eq!(options.max_nesting_level, 2);
    assert!(options.validate().is_ok());
}
