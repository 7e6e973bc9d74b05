//! Per-context cache of the last resolved account of one kind.

use core::ffi::CStr;
use core::fmt;

use crate::codepage::{self, CodePage};
use crate::directory::Directory;
use crate::entity::EntityKind;
use crate::enumerator::Enumerator;
use crate::record::{Record, ViewOf, copy_into};
use crate::writer::{ChunkStore, GrowableWriter, Mark, RegionSource};
use crate::{Config, Error};

/// The last successfully resolved record and the storage behind it.
///
/// Chunks written after the record hold synthesized names. The record only
/// answers queries made under the code page it was encoded with.
pub(crate) struct Slot<K: EntityKind> {
    store: ChunkStore,
    record: Option<K::Record>,
    code_page: CodePage,
    synthesized_from: Mark,
}

impl<K: EntityKind> Slot<K> {
    const fn new() -> Self {
        let store = ChunkStore::new();
        let synthesized_from = store.mark();
        Self {
            store,
            record: None,
            code_page: CodePage::UTF8,
            synthesized_from,
        }
    }

    #[cfg(test)]
    pub(crate) const fn record(&self) -> Option<K::Record> {
        self.record
    }

    #[cfg(test)]
    pub(crate) const fn store(&self) -> &ChunkStore {
        &self.store
    }

    #[cfg(test)]
    pub(crate) const fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    /// The record, unless it was encoded under another code page.
    fn current(&self) -> Option<K::Record> {
        self.record.filter(|_| self.code_page == CodePage::current())
    }

    /// The slot record if its name is `name`.
    fn record_named(&self, name: &CStr) -> Option<K::Record> {
        self.current()
            .filter(|record| self.store.c_str(record.name()).is_ok_and(|held| held == name))
    }

    /// The slot record if its id is `id`.
    fn record_with_id(&self, id: u32) -> Option<K::Record> {
        self.current().filter(|record| record.id() == id)
    }

    /// Replaces the record, or leaves everything as it was on failure.
    fn commit(&mut self, info: &K::Info, config: &Config) -> Result<K::Record, Error> {
        let begin = self.store.mark();
        let code_page = CodePage::current();
        let written =
            K::Record::serialize(info, config, &mut GrowableWriter::new(&mut self.store));
        match written {
            Ok(record) => {
                self.store.retain_from(begin);
                self.record = Some(record);
                self.code_page = code_page;
                self.synthesized_from = self.store.mark();
                Ok(record)
            }
            Err(err) => {
                self.store.rollback(begin);
                Err(err)
            }
        }
    }

    fn resolve(&self, record: K::Record) -> Result<ViewOf<'_, K>, Error> {
        record.resolve(&self.store)
    }

    /// Stores the decimal rendering of `id` after the record.
    fn synthesize(&mut self, id: u32, config: &Config) -> Result<&CStr, Error> {
        let newest = self.store.mark();
        let mut text = id.to_string().into_bytes();
        let len = text.len();
        text.push(0);
        let base = self.store.push(text);
        if self.store.len() > config.chunk_high_water {
            tracing::trace!(
                kind = K::NOUN,
                chunks = self.store.len(),
                "pruning synthesized names"
            );
            self.store.prune(self.synthesized_from, newest);
        }
        self.store.c_str(layout::Region::new(base, len))
    }

    fn clear(&mut self) {
        self.store.clear();
        self.record = None;
        self.synthesized_from = self.store.mark();
    }
}

/// Slot plus enumeration cursor for one account kind.
///
/// Non-reentrant queries (`&mut self`) replace the slot; the reentrant
/// `*_into` queries (`&self`) only read it.
pub struct LookupCache<K: EntityKind> {
    slot: Slot<K>,
    cursor: Enumerator<K>,
    config: Config,
}

impl<K: EntityKind> fmt::Debug for LookupCache<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupCache")
            .field("kind", &K::NOUN)
            .field("record", &self.slot.record)
            .field("chunks", &self.slot.store.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<K: EntityKind> LookupCache<K> {
    /// An empty cache.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            slot: Slot::new(),
            cursor: Enumerator::new(&config),
            config,
        }
    }

    /// Drops the slot and the cursor.
    pub fn reset(&mut self) {
        self.slot.clear();
        self.cursor.reset();
    }

    #[cfg(test)]
    pub(crate) const fn slot(&self) -> &Slot<K> {
        &self.slot
    }

    #[cfg(test)]
    pub(crate) const fn slot_mut(&mut self) -> &mut Slot<K> {
        &mut self.slot
    }

    /// The enumeration cursor.
    #[must_use]
    pub const fn cursor(&self) -> &Enumerator<K> {
        &self.cursor
    }

    fn fetch_by_name<D: Directory + ?Sized>(
        &mut self,
        dir: &D,
        name: &CStr,
    ) -> Result<K::Record, Error> {
        let wide = codepage::to_wide(name, self.config.reject_empty_names)?;
        let info = K::get_by_name(dir, &wide).map_err(K::classify)?;
        self.slot.commit(&info, &self.config)
    }

    /// Full enumeration with a private cursor.
    fn scan_for<D: Directory + ?Sized>(&self, dir: &D, id: u32) -> Result<K::Info, Error> {
        tracing::trace!(kind = K::NOUN, id, "scanning the directory");
        let mut scan = Enumerator::<K>::new(&self.config);
        while let Some(info) = scan.step(dir)? {
            if K::id_of(info) == id {
                return Ok(info.clone());
            }
        }
        Err(Error::NotFound)
    }

    fn fetch_by_id<D: Directory + ?Sized>(&mut self, dir: &D, id: u32) -> Result<K::Record, Error> {
        if let Some(record) = self.slot.record_with_id(id) {
            tracing::trace!(kind = K::NOUN, id, "slot hit");
            return Ok(record);
        }
        if let Some(info) = self.cursor.find_in_page(id) {
            tracing::trace!(kind = K::NOUN, id, "cursor page hit");
            return self.slot.commit(info, &self.config);
        }
        let info = self.scan_for(dir, id)?;
        self.slot.commit(&info, &self.config)
    }

    /// Looks `name` up in the directory and makes it the slot record.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] for an empty or unconvertible name,
    /// [`Error::NotFound`], or the mapped directory status.
    pub fn query_by_name<D: Directory + ?Sized>(
        &mut self,
        dir: &D,
        name: &CStr,
    ) -> Result<ViewOf<'_, K>, Error> {
        let record = self.fetch_by_name(dir, name)?;
        self.slot.resolve(record)
    }

    /// Finds the account with `id`: the slot, then the page of the active
    /// enumeration, then a private scan of the whole directory.
    ///
    /// # Errors
    /// [`Error::NotFound`] or the mapped directory status.
    pub fn query_by_id<D: Directory + ?Sized>(
        &mut self,
        dir: &D,
        id: u32,
    ) -> Result<ViewOf<'_, K>, Error> {
        let record = self.fetch_by_id(dir, id)?;
        self.slot.resolve(record)
    }

    /// Reentrant [`LookupCache::query_by_name`]: the result goes to `buf`.
    ///
    /// # Errors
    /// [`Error::InsufficientBuffer`] if `buf` cannot hold the entry, in
    /// which case nothing is written; otherwise as the non-reentrant query.
    pub fn query_by_name_into<'b, D: Directory + ?Sized>(
        &self,
        dir: &D,
        name: &CStr,
        buf: &'b mut [u8],
    ) -> Result<ViewOf<'b, K>, Error> {
        let wide = codepage::to_wide(name, self.config.reject_empty_names)?;
        if let Some(record) = self.slot.record_named(name) {
            tracing::trace!(kind = K::NOUN, "slot hit");
            return copy_into(record, &self.slot.store, buf);
        }
        let info = K::get_by_name(dir, &wide).map_err(K::classify)?;
        self.stage(&info, buf)
    }

    /// Reentrant [`LookupCache::query_by_id`]: the result goes to `buf`.
    ///
    /// # Errors
    /// See [`LookupCache::query_by_name_into`].
    pub fn query_by_id_into<'b, D: Directory + ?Sized>(
        &self,
        dir: &D,
        id: u32,
        buf: &'b mut [u8],
    ) -> Result<ViewOf<'b, K>, Error> {
        if let Some(record) = self.slot.record_with_id(id) {
            tracing::trace!(kind = K::NOUN, id, "slot hit");
            return copy_into(record, &self.slot.store, buf);
        }
        if let Some(info) = self.cursor.find_in_page(id) {
            tracing::trace!(kind = K::NOUN, id, "cursor page hit");
            return self.stage(info, buf);
        }
        let info = self.scan_for(dir, id)?;
        self.stage(&info, buf)
    }

    fn stage<'b>(&self, info: &K::Info, buf: &'b mut [u8]) -> Result<ViewOf<'b, K>, Error> {
        let mut scratch = ChunkStore::new();
        let record =
            K::Record::serialize(info, &self.config, &mut GrowableWriter::new(&mut scratch))?;
        copy_into(record, &scratch, buf)
    }

    /// Rewinds the enumeration.
    pub fn begin_enum(&mut self) {
        self.cursor.reset();
    }

    /// Makes the next enumerated account the slot record.
    ///
    /// # Errors
    /// The mapped directory status; the enumeration can be resumed.
    /// [`Error::InvalidArgument`] if the account cannot be represented in
    /// the current code page: the cursor has already moved past it, so the
    /// next call returns the account after it.
    pub fn next_entry<D: Directory + ?Sized>(
        &mut self,
        dir: &D,
    ) -> Result<Option<ViewOf<'_, K>>, Error> {
        let Some(info) = self.cursor.step(dir)? else {
            return Ok(None);
        };
        let record = self.slot.commit(info, &self.config)?;
        self.slot.resolve(record).map(Some)
    }

    /// Ends the enumeration and releases its page.
    pub fn end_enum(&mut self) {
        self.cursor.reset();
    }

    /// The id of the account called `name`.
    ///
    /// # Errors
    /// See [`LookupCache::query_by_name`].
    pub fn name_to_id<D: Directory + ?Sized>(&mut self, dir: &D, name: &CStr) -> Result<u32, Error> {
        if let Some(record) = self.slot.record_named(name) {
            tracing::trace!(kind = K::NOUN, "slot hit");
            return Ok(record.id());
        }
        self.fetch_by_name(dir, name).map(|record| record.id())
    }

    /// The name of the account with `id`.
    ///
    /// Unknown ids render as decimal unless `no_such_id` is set.
    ///
    /// # Errors
    /// [`Error::NotFound`] for an unknown id with `no_such_id`, or the
    /// mapped directory status.
    pub fn id_to_name<D: Directory + ?Sized>(
        &mut self,
        dir: &D,
        id: u32,
        no_such_id: bool,
    ) -> Result<&CStr, Error> {
        match self.fetch_by_id(dir, id) {
            Ok(record) => self.slot.store.c_str(record.name()),
            Err(Error::NotFound) if !no_such_id => self.slot.synthesize(id, &self.config),
            Err(err) => Err(err),
        }
    }
}
