use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coding_store::db::SqliteConnection;
use coding_store::{
    Code, CodeData, CodingDao, CodingSource, Collection, DatabaseMode, IdMap, ImportData,
    ModelCache, StoreError, StoreResult, Tag, UNSET_ID,
};

/// In-memory source whose reads can be made to fail one collection at a time
#[derive(Default)]
struct FakeSource {
    codes: Mutex<IdMap<Code>>,
    tags: Mutex<IdMap<Tag>>,
    imports: Mutex<IdMap<ImportData>>,
    code_data: Mutex<IdMap<CodeData>>,
    failing: Mutex<Option<Collection>>,
    reads: AtomicUsize,
    locks: AtomicUsize,
    unlocks: AtomicUsize,
}

impl FakeSource {
    fn fail(&self, collection: Option<Collection>) {
        *self.failing.lock().unwrap() = collection;
    }

    fn read<T: Clone>(&self, collection: Collection, map: &Mutex<IdMap<T>>) -> StoreResult<IdMap<T>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() == Some(collection) {
            return Err(StoreError::Statement(format!("{:?} unavailable", collection)));
        }
        Ok(map.lock().unwrap().clone())
    }

    fn add_code(&self, id: i64, name: &str) {
        self.codes.lock().unwrap().insert(id, Code::with_id(id, name));
    }
}

impl CodingSource for FakeSource {
    fn lock_connection(&self) {
        self.locks.fetch_add(1, Ordering::SeqCst);
    }

    fn unlock_connection(&self) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    fn close_connection(&self) -> bool {
        true
    }

    fn get_import_data(&self, _import_id: i64) -> StoreResult<IdMap<ImportData>> {
        self.read(Collection::Imports, &self.imports)
    }

    fn get_code_data_from_import(&self, _import_id: i64) -> StoreResult<IdMap<CodeData>> {
        self.read(Collection::CodeData, &self.code_data)
    }

    fn get_code(&self, _code_id: i64) -> StoreResult<IdMap<Code>> {
        self.read(Collection::Codes, &self.codes)
    }

    fn get_tag(&self, _tag_id: i64) -> StoreResult<IdMap<Tag>> {
        self.read(Collection::Tags, &self.tags)
    }
}

fn seeded_source() -> Arc<FakeSource> {
    let source = Arc::new(FakeSource::default());
    source.add_code(1, "Smile");
    source.add_code(2, "Gaze");
    source.tags.lock().unwrap().insert(1, Tag::with_id(1, "morning"));
    source
}

#[test]
fn test_initialize_loads_every_collection_under_one_lock() {
    let source = seeded_source();
    let cache = ModelCache::new();

    assert!(cache.initialize(source.clone(), true));
    assert!(cache.is_initialized());
    assert!(cache.is_cached());
    assert_eq!(source.reads.load(Ordering::SeqCst), 4);
    assert_eq!(source.locks.load(Ordering::SeqCst), 1);
    assert_eq!(source.unlocks.load(Ordering::SeqCst), 1);
    assert_eq!(cache.codes().len(), 2);
    assert_eq!(cache.tag(1), Some(Tag::with_id(1, "morning")));
}

#[test]
fn test_initialize_failure_leaves_cache_empty() {
    for failing in [
        Collection::Imports,
        Collection::Codes,
        Collection::Tags,
        Collection::CodeData,
    ] {
        let source = seeded_source();
        source.fail(Some(failing));
        let cache = ModelCache::new();

        assert!(!cache.initialize(source.clone(), true), "{:?}", failing);
        assert!(!cache.is_initialized());
        assert!(!cache.is_cached());
        assert!(cache.imports().is_empty());
        assert!(cache.code_data().is_empty());
        assert!(cache.codes().is_empty());
        assert!(cache.code_list().is_empty());
        assert!(cache.tags().is_empty());
        assert!(cache.tag_list().is_empty());
        assert!(cache.code(1).is_none());
        assert!(cache.tag(1).is_none());
        // The lock is released even when a read fails
        assert_eq!(source.unlocks.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_second_initialize_is_rejected() {
    let cache = ModelCache::new();
    assert!(cache.initialize(seeded_source(), true));
    assert!(!cache.initialize(seeded_source(), false));
    assert!(cache.is_cached());
}

#[test]
fn test_code_list_sorted_without_placeholder() {
    let source = seeded_source();
    source.add_code(UNSET_ID, "(unset)");
    let cache = ModelCache::new();
    assert!(cache.initialize(source.clone(), true));

    source.add_code(3, "Arch");
    assert!(cache.refresh_codes());

    let names: Vec<String> = cache.code_list().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, ["Arch", "Gaze", "Smile"]);
    assert_eq!(cache.code(UNSET_ID).map(|c| c.name), Some("(unset)".to_string()));
}

#[test]
fn test_failed_refresh_keeps_previous_snapshot() {
    let source = seeded_source();
    let cache = ModelCache::new();
    assert!(cache.initialize(source.clone(), true));
    let before = cache.code_list();

    source.add_code(3, "Arch");
    source.fail(Some(Collection::Codes));
    assert!(!cache.refresh_codes());

    assert_eq!(cache.code_list(), before);
    assert!(cache.code(3).is_none());
}

#[test]
fn test_snapshot_held_by_reader_is_unchanged_by_refresh() {
    let source = seeded_source();
    let cache = ModelCache::new();
    assert!(cache.initialize(source.clone(), true));

    let held = cache.codes();
    source.add_code(3, "Arch");
    assert!(cache.refresh_codes());

    assert_eq!(held.len(), 2);
    assert_eq!(cache.codes().len(), 3);
}

#[test]
fn test_refresh_code_data_when_caching_disabled() {
    let source = seeded_source();
    let cache = ModelCache::new();
    assert!(cache.initialize(source.clone(), false));
    let reads = source.reads.load(Ordering::SeqCst);

    source.fail(Some(Collection::CodeData));
    assert!(cache.refresh_code_data());
    assert_eq!(source.reads.load(Ordering::SeqCst), reads);
}

#[test]
fn test_refresh_all_stops_at_first_failure() {
    let source = seeded_source();
    let cache = ModelCache::new();
    assert!(cache.initialize(source.clone(), true));

    source.add_code(3, "Arch");
    source.fail(Some(Collection::CodeData));
    let reads = source.reads.load(Ordering::SeqCst);
    assert!(!cache.refresh_all());

    // imports and code data were read; codes and tags were never attempted
    assert_eq!(source.reads.load(Ordering::SeqCst), reads + 2);
    assert!(cache.code(3).is_none());

    source.fail(None);
    assert!(cache.refresh_all());
    assert!(cache.code(3).is_some());
}

#[test]
fn test_listeners_see_successful_refreshes_only() {
    let source = seeded_source();
    let cache = ModelCache::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    cache.subscribe(move |collection| sink.lock().unwrap().push(collection));

    assert!(cache.initialize(source.clone(), true));
    assert_eq!(seen.lock().unwrap().len(), 4);

    seen.lock().unwrap().clear();
    assert!(cache.refresh_tags());
    source.fail(Some(Collection::Imports));
    assert!(!cache.refresh_import_data());
    assert_eq!(*seen.lock().unwrap(), vec![Collection::Tags]);
}

#[test]
fn test_listener_can_subscribe_from_callback() {
    let cache = Arc::new(ModelCache::new());
    let fired = Arc::new(AtomicUsize::new(0));
    let (weak, counter) = (Arc::downgrade(&cache), fired.clone());
    cache.subscribe(move |_| {
        if let Some(cache) = weak.upgrade() {
            assert_eq!(cache.code_list().len(), 2);
            let counter = counter.clone();
            cache.subscribe(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    // Each of the four notifications adds a listener that runs from the next one on
    assert!(cache.initialize(seeded_source(), true));
    assert_eq!(fired.load(Ordering::SeqCst), 6);
}

#[test]
fn test_cache_over_sqlite_dao() {
    let guard = tempfile::tempdir().unwrap();
    let dao = Arc::new(CodingDao::new(SqliteConnection::new(guard.path().join("test.sqlite"))));
    assert!(dao.create_tables(DatabaseMode::Sqlite));

    let import_id = dao
        .insert_import_data(&ImportData::new(
            "s01.mp4",
            2020,
            7,
            1,
            "fam7-p1",
            NaiveDate::from_ymd_opt(2020, 1, 5).unwrap(),
        ))
        .unwrap();
    let smile = dao.insert_new_code(&Code::new("Smile")).unwrap();
    let gaze = dao.insert_new_code(&Code::new("Gaze")).unwrap();
    let late = dao
        .insert_code_data(&CodeData::new(import_id, 9000, 500, Code::with_id(smile, "Smile"), None))
        .unwrap();
    let early = dao
        .insert_code_data(&CodeData::new(import_id, 1000, 500, Code::with_id(gaze, "Gaze"), None))
        .unwrap();

    let cache = ModelCache::new();
    assert!(cache.initialize(dao.clone(), true));
    assert!(!dao.is_connection_locked());

    assert_eq!(cache.import(import_id).map(|i| i.filename), Some("s01.mp4".to_string()));
    let ordered: Vec<i64> = cache.code_data_for_import(import_id).iter().map(|d| d.id).collect();
    assert_eq!(ordered, vec![early, late]);
    let names: Vec<String> = cache.code_list().iter().map(|c| c.name.clone()).collect();
    assert_eq!(names, ["Gaze", "Smile"]);

    let tag = dao.insert_new_tag(&Tag::new("morning")).unwrap();
    assert!(cache.refresh_tags());
    assert_eq!(cache.tag_list().iter().map(|t| t.id).collect::<Vec<_>>(), vec![tag]);
}
