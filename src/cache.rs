//! In-memory mirror of the store.
//!
//! [`ModelCache`] holds one collection per entity plus the sorted code and tag
//! lists. Each collection is an immutable snapshot behind an `RwLock<Arc<_>>`:
//! a refresh builds the replacement completely and swaps it in, so a reader
//! sees the old snapshot or the new one and never a half-filled map. A failed
//! read leaves the previous snapshot in place.
//!
//! The cache starts uninitialized and becomes initialized once, through
//! [`ModelCache::initialize`]. Until then every accessor returns empty data and
//! every refresh fails.

use log::{debug, error, warn};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard};

use crate::dao::CodingDao;
use crate::error::StoreResult;
use crate::records::{Code, CodeData, IdMap, ImportData, Tag, UNSET_ID};
use crate::store::StoreConnection;

/// What the cache needs from the data access layer
pub trait CodingSource: Send + Sync {
    fn lock_connection(&self);
    fn unlock_connection(&self);
    fn close_connection(&self) -> bool;
    fn get_import_data(&self, import_id: i64) -> StoreResult<IdMap<ImportData>>;
    fn get_code_data_from_import(&self, import_id: i64) -> StoreResult<IdMap<CodeData>>;
    fn get_code(&self, code_id: i64) -> StoreResult<IdMap<Code>>;
    fn get_tag(&self, tag_id: i64) -> StoreResult<IdMap<Tag>>;
}

impl<C: StoreConnection> CodingSource for CodingDao<C> {
    fn lock_connection(&self) {
        CodingDao::lock_connection(self)
    }

    fn unlock_connection(&self) {
        CodingDao::unlock_connection(self)
    }

    fn close_connection(&self) -> bool {
        CodingDao::close_connection(self)
    }

    fn get_import_data(&self, import_id: i64) -> StoreResult<IdMap<ImportData>> {
        CodingDao::get_import_data(self, import_id)
    }

    fn get_code_data_from_import(&self, import_id: i64) -> StoreResult<IdMap<CodeData>> {
        CodingDao::get_code_data_from_import(self, import_id)
    }

    fn get_code(&self, code_id: i64) -> StoreResult<IdMap<Code>> {
        CodingDao::get_code(self, code_id)
    }

    fn get_tag(&self, tag_id: i64) -> StoreResult<IdMap<Tag>> {
        CodingDao::get_tag(self, tag_id)
    }
}

/// The four cached collections, used in change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Imports,
    CodeData,
    Codes,
    Tags,
}

type Listener = Arc<dyn Fn(Collection) + Send + Sync>;

/// A keyed collection together with its pre-sorted list
struct Sorted<T> {
    by_id: Arc<IdMap<T>>,
    ordered: Arc<Vec<T>>,
}

impl<T> Default for Sorted<T> {
    fn default() -> Self {
        Self {
            by_id: Arc::new(IdMap::new()),
            ordered: Arc::new(Vec::new()),
        }
    }
}

impl<T: Clone> Sorted<T> {
    /// Sort once, skipping the placeholder id. Ties keep id order.
    fn build(by_id: IdMap<T>, compare: impl Fn(&T, &T) -> Ordering) -> Self {
        let mut ordered: Vec<T> = by_id
            .iter()
            .filter(|(id, _)| **id != UNSET_ID)
            .map(|(_, record)| record.clone())
            .collect();
        ordered.sort_by(compare);
        Self {
            by_id: Arc::new(by_id),
            ordered: Arc::new(ordered),
        }
    }
}

fn codes_by_name(codes: IdMap<Code>) -> Sorted<Code> {
    Sorted::build(codes, |a, b| a.name.cmp(&b.name))
}

fn tags_by_value(tags: IdMap<Tag>) -> Sorted<Tag> {
    Sorted::build(tags, |a, b| a.value.cmp(&b.value))
}

struct Binding {
    source: Arc<dyn CodingSource>,
    cache_code_data: bool,
}

struct Snapshot {
    imports: IdMap<ImportData>,
    codes: IdMap<Code>,
    tags: IdMap<Tag>,
    code_data: IdMap<CodeData>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn replace<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

#[derive(Default)]
pub struct ModelCache {
    binding: OnceLock<Binding>,
    writer: Mutex<()>,
    imports: RwLock<Arc<IdMap<ImportData>>>,
    code_data: RwLock<Arc<IdMap<CodeData>>>,
    codes: RwLock<Sorted<Code>>,
    tags: RwLock<Sorted<Tag>>,
    listeners: RwLock<Vec<Listener>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load all four collections over one locked connection and mark the cache initialized.
    ///
    /// `cache_code_data` decides whether code data is served from the cache;
    /// when false, `refresh_code_data` does nothing and consumers should ask the
    /// DAO directly. If any read fails the cache stays uninitialized and empty.
    pub fn initialize(&self, source: Arc<dyn CodingSource>, cache_code_data: bool) -> bool {
        let writer = self.lock_writer();
        if self.binding.get().is_some() {
            warn!("Model cache is already initialized");
            return false;
        }

        source.lock_connection();
        let loaded = Self::load(source.as_ref());
        source.unlock_connection();
        source.close_connection();

        let snapshot = match loaded {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Error initializing model: {}", e);
                return false;
            }
        };

        replace(&self.imports, Arc::new(snapshot.imports));
        replace(&self.codes, codes_by_name(snapshot.codes));
        replace(&self.tags, tags_by_value(snapshot.tags));
        replace(&self.code_data, Arc::new(snapshot.code_data));
        // Unreachable while the writer lock is held and the check above passed
        if self
            .binding
            .set(Binding {
                source,
                cache_code_data,
            })
            .is_err()
        {
            warn!("Model cache was initialized concurrently");
            return false;
        }
        drop(writer);

        debug!(
            "Model cache initialized: {} imports, {} codes, {} tags, {} code data",
            self.imports().len(),
            self.codes().len(),
            self.tags().len(),
            self.code_data().len()
        );
        for collection in [
            Collection::Imports,
            Collection::Codes,
            Collection::Tags,
            Collection::CodeData,
        ] {
            self.notify(collection);
        }
        true
    }

    fn load(source: &dyn CodingSource) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            imports: source.get_import_data(UNSET_ID)?,
            codes: source.get_code(UNSET_ID)?,
            tags: source.get_tag(UNSET_ID)?,
            code_data: source.get_code_data_from_import(UNSET_ID)?,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.binding.get().is_some()
    }

    /// Whether code data is served from the cache. False until initialized.
    pub fn is_cached(&self) -> bool {
        self.binding.get().is_some_and(|b| b.cache_code_data)
    }

    /// Reread one collection and swap it in when the read succeeds
    fn refresh_with<T>(
        &self,
        collection: Collection,
        fetch: impl FnOnce(&dyn CodingSource) -> StoreResult<T>,
        install: impl FnOnce(&Self, T),
    ) -> bool {
        let Some(binding) = self.binding.get() else {
            warn!("Cannot refresh {:?} before the model cache is initialized", collection);
            return false;
        };

        let writer = self.lock_writer();
        match fetch(binding.source.as_ref()) {
            Ok(fresh) => install(self, fresh),
            Err(_) => {
                warn!("Failed to refresh {:?}", collection);
                return false;
            }
        }
        drop(writer);

        self.notify(collection);
        true
    }

    pub fn refresh_import_data(&self) -> bool {
        self.refresh_with(
            Collection::Imports,
            |source| source.get_import_data(UNSET_ID),
            |cache, imports| replace(&cache.imports, Arc::new(imports)),
        )
    }

    /// Succeeds without touching the store when code data caching is disabled
    pub fn refresh_code_data(&self) -> bool {
        if self.is_initialized() && !self.is_cached() {
            debug!("Code data caching disabled; skipping refresh");
            return true;
        }
        self.refresh_with(
            Collection::CodeData,
            |source| source.get_code_data_from_import(UNSET_ID),
            |cache, data| replace(&cache.code_data, Arc::new(data)),
        )
    }

    pub fn refresh_codes(&self) -> bool {
        self.refresh_with(
            Collection::Codes,
            |source| source.get_code(UNSET_ID),
            |cache, codes| replace(&cache.codes, codes_by_name(codes)),
        )
    }

    pub fn refresh_tags(&self) -> bool {
        self.refresh_with(
            Collection::Tags,
            |source| source.get_tag(UNSET_ID),
            |cache, tags| replace(&cache.tags, tags_by_value(tags)),
        )
    }

    /// Refresh imports, code data, codes and tags in that order.
    /// Stops at the first failure; the remaining collections keep their snapshot.
    pub fn refresh_all(&self) -> bool {
        self.refresh_import_data()
            && self.refresh_code_data()
            && self.refresh_codes()
            && self.refresh_tags()
    }

    /// Call `listener` after every successful replacement of a collection
    pub fn subscribe(&self, listener: impl Fn(Collection) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Listeners run with no cache lock held, so they may read, refresh or subscribe
    fn notify(&self, collection: Collection) {
        let listeners: Vec<Listener> = read(&self.listeners).clone();
        for listener in listeners {
            listener(collection);
        }
    }

    pub fn imports(&self) -> Arc<IdMap<ImportData>> {
        read(&self.imports).clone()
    }

    pub fn import(&self, import_id: i64) -> Option<ImportData> {
        read(&self.imports).get(&import_id).cloned()
    }

    pub fn code_data(&self) -> Arc<IdMap<CodeData>> {
        read(&self.code_data).clone()
    }

    pub fn code_data_entry(&self, data_id: i64) -> Option<CodeData> {
        read(&self.code_data).get(&data_id).cloned()
    }

    /// Cached code data of one import ordered by start time
    pub fn code_data_for_import(&self, import_id: i64) -> Vec<CodeData> {
        let mut entries: Vec<CodeData> = read(&self.code_data)
            .values()
            .filter(|entry| entry.import_id == import_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.time, entry.id));
        entries
    }

    pub fn codes(&self) -> Arc<IdMap<Code>> {
        read(&self.codes).by_id.clone()
    }

    pub fn code(&self, code_id: i64) -> Option<Code> {
        read(&self.codes).by_id.get(&code_id).cloned()
    }

    /// Codes ordered by name, without the placeholder id
    pub fn code_list(&self) -> Arc<Vec<Code>> {
        read(&self.codes).ordered.clone()
    }

    pub fn tags(&self) -> Arc<IdMap<Tag>> {
        read(&self.tags).by_id.clone()
    }

    pub fn tag(&self, tag_id: i64) -> Option<Tag> {
        read(&self.tags).by_id.get(&tag_id).cloned()
    }

    /// Tags ordered by value, without the placeholder id
    pub fn tag_list(&self) -> Arc<Vec<Tag>> {
        read(&self.tags).ordered.clone()
    }
}
