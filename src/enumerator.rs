//! Pull-style cursor over the paged directory enumeration.

use core::fmt;

use crate::directory::{Directory, ResumeToken};
use crate::entity::EntityKind;
use crate::{Config, Error, Status};

/// Cursor over all accounts of kind `K`.
///
/// ```text
/// Idle --step--> Paged --step--> Paged | Exhausted
///   ^                                      |
///   +-------------------reset--------------+
/// ```
///
/// The first [`Enumerator::step`] fetches the first page. When a page is
/// consumed and the directory announced more entries, the next page is
/// requested with the stored resume token. A page request that fails with
/// [`Status::BufferTooSmall`] is retried with a doubled page hint.
pub struct Enumerator<K: EntityKind> {
    page: Option<Vec<K::Info>>,
    read: usize,
    offset: usize,
    position: usize,
    total: usize,
    resume: ResumeToken,
    more: bool,
    exhausted: bool,
    page_hint: usize,
    initial_page_hint: usize,
    max_page_retries: u32,
}

impl<K: EntityKind> fmt::Debug for Enumerator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerator")
            .field("kind", &K::NOUN)
            .field("page_len", &self.page.as_ref().map(Vec::len))
            .field("read", &self.read)
            .field("offset", &self.offset)
            .field("position", &self.position)
            .field("total", &self.total)
            .field("resume", &self.resume)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl<K: EntityKind> Enumerator<K> {
    /// An idle cursor using the paging settings of `config`.
    #[must_use]
    pub const fn new(config: &Config) -> Self {
        Self {
            page: None,
            read: 0,
            offset: 0,
            position: 0,
            total: 0,
            resume: ResumeToken::START,
            more: false,
            exhausted: false,
            page_hint: config.initial_page_hint,
            initial_page_hint: config.initial_page_hint,
            max_page_retries: config.max_page_retries,
        }
    }

    /// Back to idle; the page is released and the next step starts over.
    pub fn reset(&mut self) {
        self.page = None;
        self.read = 0;
        self.offset = 0;
        self.position = 0;
        self.total = 0;
        self.resume = ResumeToken::START;
        self.more = false;
        self.exhausted = false;
        self.page_hint = self.initial_page_hint;
    }

    /// `true` while a page is held and entries may remain.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.page.is_some() && !self.exhausted
    }

    /// `true` once every entry was returned.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Entries returned so far.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Number of entries the directory announced so far.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// The page currently held, if any.
    #[inline]
    #[must_use]
    pub fn current_page(&self) -> Option<&[K::Info]> {
        self.page.as_deref()
    }

    /// Looks `id` up in the current page without touching the cursor.
    #[must_use]
    pub fn find_in_page(&self, id: u32) -> Option<&K::Info> {
        self.current_page()?
            .iter()
            .find(|info| K::id_of(info) == id)
    }

    /// Fetches the page at the resume token, growing the page hint as needed.
    ///
    /// # Errors
    /// The mapped directory status; [`Error::Io`] once the retries for
    /// [`Status::BufferTooSmall`] are used up.
    pub fn query<D: Directory + ?Sized>(&mut self, dir: &D) -> Result<(), Error> {
        let mut retries = 0u32;
        let page = loop {
            match K::enumerate(dir, self.page_hint, self.resume) {
                Ok(page) => break page,
                Err(Status::BufferTooSmall) if retries < self.max_page_retries => {
                    retries += 1;
                    self.page_hint = self.page_hint.saturating_mul(2);
                    tracing::debug!(
                        kind = K::NOUN,
                        page_hint = self.page_hint,
                        "page too small, retrying"
                    );
                }
                Err(Status::BufferTooSmall) => {
                    tracing::warn!(
                        kind = K::NOUN,
                        page_hint = self.page_hint,
                        retries,
                        "giving up growing the page"
                    );
                    return Err(Error::Io);
                }
                Err(status) => return Err(K::classify(status)),
            }
        };
        let previous = self.page.as_ref().map_or(0, Vec::len);
        self.offset += previous;
        self.read = 0;
        self.total = self.offset + page.total_entries;
        self.resume = page.resume;
        self.more = page.more;
        tracing::debug!(
            kind = K::NOUN,
            offset = self.offset,
            len = page.entries.len(),
            total = self.total,
            "fetched page"
        );
        self.page = Some(page.entries);
        Ok(())
    }

    fn finish(&mut self) {
        self.page = None;
        self.exhausted = true;
    }

    fn page_len(&self) -> usize {
        self.page.as_ref().map_or(0, Vec::len)
    }

    /// Advances to the next entry.
    ///
    /// Returns `Ok(None)` once every entry was returned; further calls do
    /// not reach the directory until [`Enumerator::reset`].
    ///
    /// # Errors
    /// See [`Enumerator::query`]. The cursor is left where it was, so the
    /// step can be retried.
    pub fn step<D: Directory + ?Sized>(&mut self, dir: &D) -> Result<Option<&K::Info>, Error> {
        if self.exhausted {
            return Ok(None);
        }
        if self.page.is_none() {
            self.query(dir)?;
        }
        while self.read >= self.page_len() {
            if self.position >= self.total {
                self.finish();
                return Ok(None);
            }
            if !self.more {
                tracing::warn!(
                    kind = K::NOUN,
                    position = self.position,
                    total = self.total,
                    "directory has no more data before the announced total"
                );
                self.finish();
                return Ok(None);
            }
            self.query(dir)?;
            if self.page_len() == 0 {
                tracing::warn!(
                    kind = K::NOUN,
                    position = self.position,
                    total = self.total,
                    "empty page before the announced total"
                );
                self.finish();
                return Ok(None);
            }
        }
        let index = self.read;
        self.read += 1;
        self.position += 1;
        Ok(self.page.as_ref().and_then(|page| page.get(index)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;
    use crate::directory::{Call, GroupInfo, MemoryDirectory, RawPage, UserInfo};
    use crate::entity::User;
    use tracing_test::traced_test;
    use widestring::{U16CStr, U16CString};

    fn directory(count: u32) -> MemoryDirectory {
        (0..count).fold(MemoryDirectory::new(), |dir, i| {
            dir.with_user(UserInfo::new(&format!("u{i}"), 1000 + i, 513))
        })
    }

    fn drain(cursor: &mut Enumerator<User>, dir: &MemoryDirectory) -> Vec<u32> {
        let mut ids = Vec::new();
        while let Some(info) = cursor.step(dir).unwrap() {
            ids.push(info.user_id);
        }
        ids
    }

    #[test]
    fn walks_every_page_once() {
        let dir = directory(10).with_page_limit(3);
        let mut cursor = Enumerator::<User>::new(&Config::DEFAULT);
        let ids = drain(&mut cursor, &dir);
        assert_eq!(ids, (1000..1010).collect::<Vec<_>>());
        assert_eq!(cursor.total(), 10);
        assert_eq!(dir.calls(Call::EnumUsers), 4);

        // Exhausted: no more directory traffic.
        assert!(cursor.step(&dir).unwrap().is_none());
        assert_eq!(dir.calls(Call::EnumUsers), 4);
    }

    #[test]
    fn reset_starts_over() {
        let dir = directory(4).with_page_limit(3);
        let mut cursor = Enumerator::<User>::new(&Config::DEFAULT);
        cursor.step(&dir).unwrap();
        assert!(cursor.is_active());
        cursor.reset();
        assert!(!cursor.is_active());
        assert_eq!(drain(&mut cursor, &dir).len(), 4);
    }

    #[test]
    #[traced_test]
    fn page_hint_doubles_after_buffer_too_small() {
        let dir = directory(3);
        let config = Config::DEFAULT.with_initial_page_hint(1);
        let mut cursor = Enumerator::<User>::new(&config);
        assert_eq!(drain(&mut cursor, &dir).len(), 3);
        assert!(logs_contain("page too small, retrying"));
    }

    #[test]
    fn retries_are_bounded() {
        let dir = directory(1);
        let config = Config::DEFAULT
            .with_initial_page_hint(1)
            .with_max_page_retries(2);
        let mut cursor = Enumerator::<User>::new(&config);
        assert_eq!(cursor.step(&dir).unwrap_err(), Error::Io);
        assert_eq!(dir.calls(Call::EnumUsers), 3);
    }

    #[test]
    fn failed_step_can_be_retried() {
        let dir = directory(2).with_page_limit(1);
        let mut cursor = Enumerator::<User>::new(&Config::DEFAULT);
        assert!(cursor.step(&dir).unwrap().is_some());
        dir.fail_next(Call::EnumUsers, Status::AccessDenied);
        assert_eq!(cursor.step(&dir).unwrap_err(), Error::PermissionDenied);
        assert_eq!(cursor.step(&dir).unwrap().map(|info| info.user_id), Some(1001));
        assert!(cursor.step(&dir).unwrap().is_none());
    }

    #[test]
    fn current_page_lookup() {
        let dir = directory(5).with_page_limit(2);
        let mut cursor = Enumerator::<User>::new(&Config::DEFAULT);
        cursor.step(&dir).unwrap();
        assert!(cursor.find_in_page(1001).is_some());
        assert!(cursor.find_in_page(1004).is_none());
    }

    /// Announces more entries than it ever delivers.
    struct Overpromising;

    impl Directory for Overpromising {
        fn user_info(&self, _: &U16CStr, _: u32) -> Result<UserInfo, Status> {
            Err(Status::UserNotFound)
        }

        fn enum_users(
            &self,
            _: u32,
            _: usize,
            resume: ResumeToken,
        ) -> Result<RawPage<UserInfo>, Status> {
            let entries = if resume == ResumeToken::START {
                vec![UserInfo::new("only", 1, 1)]
            } else {
                Vec::new()
            };
            Ok(RawPage {
                entries,
                total_entries: 10,
                resume: ResumeToken(resume.0 + 1),
                more: true,
            })
        }

        fn group_info(&self, _: &U16CStr, _: u32) -> Result<GroupInfo, Status> {
            Err(Status::GroupNotFound)
        }

        fn enum_groups(
            &self,
            _: u32,
            _: usize,
            _: ResumeToken,
        ) -> Result<RawPage<GroupInfo>, Status> {
            Err(Status::AccessDenied)
        }

        fn current_user_name(&self, _: bool) -> Result<U16CString, Status> {
            Err(Status::UserNotFound)
        }
    }

    #[test]
    #[traced_test]
    fn empty_page_ends_the_enumeration() {
        let mut cursor = Enumerator::<User>::new(&Config::DEFAULT);
        assert!(cursor.step(&Overpromising).unwrap().is_some());
        assert!(cursor.step(&Overpromising).unwrap().is_none());
        assert!(cursor.is_exhausted());
        assert!(logs_contain("empty page before the announced total"));
    }
}
