#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in tests")]
#![allow(clippy::indexing_slicing, reason = "Indexing is not an issue in tests")]

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CString;

use proptest::prelude::*;
use tracing_test::traced_test;
use wusers::{
    Call, Config, Error, GroupInfo, Lookup, MemoryDirectory, Privilege, Status, UserInfo,
};

fn user(id: u32, full_name: &str) -> UserInfo {
    UserInfo::new(&format!("user{id}"), id, 513)
        .with_full_name(full_name)
        .with_home_dir(&format!("C:\\Users\\user{id}"))
        .with_privilege(Privilege::User)
}

fn sample() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(user(1001, "Alice"))
        .with_user(user(1002, "Bob"))
        .with_user(user(500, "Administrator").with_privilege(Privilege::Administrator))
        .with_group(
            GroupInfo::new("staff", 513)
                .with_member("user1001")
                .with_member("user1002"),
        )
        .with_group(GroupInfo::new("empty", 600))
        .with_page_limit(2)
}

fn users_strategy() -> impl Strategy<Value = BTreeMap<u32, String>> {
    proptest::collection::btree_map(1u32..100_000, "[ -~\u{e9}\u{4e2d}]{0,20}", 1..25)
}

fn directory_of(users: &BTreeMap<u32, String>, page_limit: usize) -> MemoryDirectory {
    users
        .iter()
        .fold(MemoryDirectory::new(), |dir, (&id, full_name)| {
            dir.with_user(user(id, full_name))
        })
        .with_page_limit(page_limit)
}

fn cname(id: u32) -> CString {
    CString::new(format!("user{id}")).unwrap()
}

proptest! {
    #[test]
    fn by_name_and_by_id_agree(users in users_strategy(), page_limit in 1usize..6) {
        let mut lookup = Lookup::new(directory_of(&users, page_limit));
        for &id in users.keys() {
            let by_name = lookup.getpwnam(&cname(id)).unwrap().dup();
            // Start the by-id lookup from a cold slot.
            lookup.reset();
            let by_id = lookup.getpwuid(id).unwrap();
            prop_assert_eq!(by_id, by_name);
        }
    }

    #[test]
    fn enumeration_returns_every_user_once(
        users in users_strategy(),
        page_limit in 1usize..6,
        page_hint in 64usize..4096,
    ) {
        let config = Config::DEFAULT.with_initial_page_hint(page_hint);
        let mut lookup = Lookup::with_config(directory_of(&users, page_limit), config);
        let mut seen = BTreeSet::new();
        lookup.setpwent();
        while let Some(pw) = lookup.getpwent().unwrap() {
            prop_assert!(seen.insert(pw.uid), "uid {} returned twice", pw.uid);
        }
        prop_assert_eq!(seen, users.keys().copied().collect::<BTreeSet<_>>());
        // Exhausted enumerations stay exhausted without directory traffic.
        let calls = lookup.directory().total_calls();
        prop_assert!(lookup.getpwent().unwrap().is_none());
        prop_assert_eq!(lookup.directory().total_calls(), calls);
    }

    #[test]
    fn reentrant_buffer_boundary(users in users_strategy()) {
        let lookup = Lookup::new(directory_of(&users, 3));
        for &id in users.keys() {
            let mut big = vec![0u8; 4096];
            let required = lookup.getpwuid_r(id, &mut big).unwrap().footprint();

            let mut one = [0u8; 1];
            prop_assert_eq!(lookup.getpwuid_r(id, &mut one).unwrap_err(), Error::InsufficientBuffer);
            let mut short = vec![0xAAu8; required - 1];
            prop_assert_eq!(
                lookup.getpwnam_r(&cname(id), &mut short).unwrap_err(),
                Error::InsufficientBuffer
            );
            prop_assert!(short.iter().all(|&b| b == 0xAA), "failed lookup wrote into the buffer");
            for len in [required, required + 1] {
                let mut buf = vec![0u8; len];
                let pw = lookup.getpwnam_r(&cname(id), &mut buf).unwrap();
                prop_assert_eq!(pw.uid, id);
                prop_assert_eq!(pw.footprint(), required);
            }
        }
    }

    #[test]
    fn name_and_id_round_trip(users in users_strategy()) {
        let mut lookup = Lookup::new(directory_of(&users, 4));
        for &id in users.keys() {
            let name = cname(id);
            let uid = lookup.uid_from_user(&name).unwrap();
            prop_assert_eq!(uid, id);
            prop_assert_eq!(lookup.user_from_uid(uid, false).unwrap(), name.as_c_str());
        }
    }
}

#[test]
fn unmapped_ids_render_as_decimal() {
    let mut lookup = Lookup::new(sample());
    assert_eq!(lookup.user_from_uid(77, false).unwrap(), c"77");
    assert_eq!(lookup.user_from_uid(77, true), Err(Error::NotFound));
    assert_eq!(lookup.group_from_gid(4_000_000_000, false).unwrap(), c"4000000000");
    assert_eq!(lookup.group_from_gid(513, true).unwrap(), c"staff");
}

#[test]
fn group_lookups() {
    let mut lookup = Lookup::new(sample());
    let staff = lookup.getgrnam(c"staff").unwrap().dup();
    assert_eq!(staff.gid, 513);
    assert_eq!(staff.members, [cname(1001), cname(1002)]);
    assert_eq!(lookup.gid_from_group(c"staff"), Ok(513));

    let mut buf = [0u8; 128];
    let empty = lookup.getgrgid_r(600, &mut buf).unwrap();
    assert!(empty.members.is_empty());

    let mut seen = Vec::new();
    lookup.setgroupent(true);
    while let Some(group) = lookup.getgrent().unwrap() {
        seen.push(group.gid);
    }
    lookup.endgrent();
    assert_eq!(seen, [513, 600]);
}

#[test]
fn group_buffer_boundary() {
    let lookup = Lookup::new(sample());
    let mut big = [0u8; 512];
    let required = lookup.getgrnam_r(c"staff", &mut big).unwrap().footprint();
    let mut short = vec![0u8; required - 1];
    assert_eq!(
        lookup.getgrnam_r(c"staff", &mut short).unwrap_err(),
        Error::InsufficientBuffer
    );
    let mut exact = vec![0u8; required];
    assert_eq!(lookup.getgrnam_r(c"staff", &mut exact).unwrap().members.len(), 2);
}

#[test]
fn field_mapping() {
    let mut lookup = Lookup::new(sample());
    let pw = lookup.getpwnam(c"user500").unwrap();
    assert_eq!(pw.passwd, c"*");
    assert_eq!(pw.class, c"Administrator");
    assert_eq!(pw.gecos, c"Administrator");
    assert_eq!(pw.dir, c"C:\\Users\\user500");
    assert_eq!(pw.shell, c"cmd.exe");
    assert_eq!((pw.change, pw.expire), (0, 0));
}

#[test]
fn configured_shell_and_placeholder() {
    let config = Config::DEFAULT
        .with_default_shell(c"pwsh.exe")
        .with_password_placeholder(c"x");
    let mut lookup = Lookup::with_config(sample(), config);
    let pw = lookup.getpwuid(1001).unwrap();
    assert_eq!((pw.shell, pw.passwd), (c"pwsh.exe", c"x"));
    assert_eq!(lookup.getgrnam(c"staff").unwrap().passwd, c"x");
}

#[test]
fn empty_names_are_invalid() {
    let mut lookup = Lookup::new(sample());
    assert_eq!(lookup.getpwnam(c"").unwrap_err(), Error::InvalidArgument);
    assert_eq!(lookup.directory().total_calls(), 0);

    let config = Config::DEFAULT.with_reject_empty_names(false);
    let mut lookup = Lookup::with_config(sample(), config);
    assert_eq!(lookup.getpwnam(c"").unwrap_err(), Error::NotFound);
    assert_eq!(lookup.directory().calls(Call::UserInfo), 1);
}

#[test]
#[traced_test]
fn directory_failures_are_classified() {
    let mut lookup = Lookup::new(sample());
    lookup.directory().fail_next(Call::UserInfo, Status::AccessDenied);
    assert_eq!(lookup.getpwnam(c"user1001").unwrap_err(), Error::PermissionDenied);

    lookup.directory().fail_next(Call::EnumUsers, Status::InvalidComputer);
    lookup.setpwent();
    assert_eq!(lookup.getpwent().unwrap_err(), Error::HostUnreachable);

    lookup.directory().fail_next(Call::EnumGroups, Status::InvalidLevel);
    assert_eq!(lookup.getgrgid(513).unwrap_err(), Error::InvalidArgument);

    lookup.directory().fail_next(Call::GroupInfo, Status::Other(31));
    assert_eq!(lookup.getgrnam(c"staff").unwrap_err(), Error::Io);
    assert!(logs_contain("directory call failed"));
}

#[test]
fn getpwent_resumes_after_a_failure() {
    let mut lookup = Lookup::new(sample());
    lookup.setpassent(false);
    assert!(lookup.getpwent().unwrap().is_some());
    assert!(lookup.getpwent().unwrap().is_some());
    lookup.directory().fail_next(Call::EnumUsers, Status::BadNetPath);
    assert_eq!(lookup.getpwent().unwrap_err(), Error::HostUnreachable);
    assert_eq!(lookup.getpwent().unwrap().unwrap().uid, 500);
    assert!(lookup.getpwent().unwrap().is_none());
    lookup.endpwent();
}

#[test]
fn slot_entry_is_the_last_successful_lookup() {
    let mut lookup = Lookup::new(sample());
    lookup.getpwnam(c"user1002").unwrap();
    assert_eq!(lookup.getpwnam(c"nobody").unwrap_err(), Error::NotFound);
    let calls = lookup.directory().total_calls();
    // The slot still holds user1002, so no directory call is needed.
    assert_eq!(lookup.getpwuid(1002).unwrap().gecos, c"Bob");
    assert_eq!(lookup.directory().total_calls(), calls);
}
