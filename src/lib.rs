//! # POSIX account lookup over the Windows account directory
//!
//! `<pwd.h>` and `<grp.h>` style lookups (`getpwnam`, `getpwuid`,
//! `getgrnam`, `getgrgid`, their reentrant `_r` variants, `getpwent`
//! enumeration and the BSD name/id helpers) on top of a directory service
//! that has none of the POSIX notions: no iteration cursor, no uid/gid,
//! UTF-16 strings and a call convention that hands out one platform buffer
//! per call.
//!
//! The crate provides:
//! - [`Lookup`]: a lookup context with the familiar entry points.
//! - [`Directory`]: the seam to the account service, implemented by
//!   [`MemoryDirectory`] everywhere and by `NetDirectory` on Windows.
//! - [`Passwd`] and [`Group`]: entries borrowed from the context or from a
//!   caller buffer, with owned copies [`PasswdBuf`] and [`GroupBuf`].
//! - [`codepage`]: narrow/wide conversion under a process-wide or
//!   per-thread code page.
//!
//! ## Lifetimes instead of "valid until the next call"
//! A non-reentrant lookup returns an entry that borrows the [`Lookup`]
//! mutably, so the borrow checker enforces what POSIX only documents: the
//! entry is gone once the next lookup replaces it. Reentrant lookups take
//! `&self` and cannot touch the cached entry at all.
//!
//! ## Ids
//! `pw_uid`, `pw_gid` and `gr_gid` are the relative identifiers (RIDs) the
//! directory assigns to accounts.
//!
//! ## Examples
//! ```rust
//! use wusers::{Error, Lookup, MemoryDirectory, UserInfo};
//!
//! let dir = MemoryDirectory::new().with_user(UserInfo::new("alice", 1001, 513));
//! let mut lookup = Lookup::new(dir);
//!
//! assert_eq!(lookup.uid_from_user(c"alice"), Ok(1001));
//! assert_eq!(lookup.user_from_uid(4242, false).unwrap(), c"4242");
//!
//! let mut small = [0u8; 4];
//! assert_eq!(lookup.getpwnam_r(c"alice", &mut small).unwrap_err(), Error::InsufficientBuffer);
//! ```
//!
//! ### (Windows) The local account database
//! ```no_run
//! # #[cfg(windows)]
//! # {
//! use wusers::{Lookup, NetDirectory};
//!
//! let mut lookup = Lookup::new(NetDirectory::new());
//! lookup.setpwent();
//! while let Some(pw) = lookup.getpwent().unwrap() {
//!     let _ = (pw.uid, pw.name);
//! }
//! lookup.endpwent();
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]

pub mod cache;
pub mod codepage;
mod config;
pub mod directory;
pub mod entity;
pub mod enumerator;
mod error;
mod lookup;
pub mod record;
mod status;
pub mod writer;

pub use cache::LookupCache;
pub use codepage::CodePage;
pub use config::Config;
#[cfg(windows)]
pub use directory::NetDirectory;
pub use directory::{
    Call, Directory, GroupInfo, MemoryDirectory, Privilege, RawPage, ResumeToken, UserInfo,
};
pub use entity::EntityKind;
pub use enumerator::Enumerator;
pub use error::Error;
pub use layout::Region;
pub use lookup::Lookup;
pub use record::{Group, GroupBuf, Passwd, PasswdBuf};
pub use status::Status;

/// User id (`uid_t`).
pub type Uid = u32;
/// Group id (`gid_t`).
pub type Gid = u32;
