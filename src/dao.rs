//! Data access object for imports, code data, codes and tags.
//!
//! Every public method is one store operation: open the connection if needed,
//! run the statement, map the rows, close the connection again. Failures are
//! logged here and turned into the method's failure value (`None`, `false` or
//! `Err`), so nothing below this layer leaks out as a panic.
//!
//! `lock_connection` keeps the physical connection open across calls until
//! `unlock_connection`. The lock belongs to the calling thread: while it is
//! held, calls from other threads wait, so a locked batch is an exclusive
//! session. Only one lock layer is tracked; a second `lock_connection` from the
//! owner is a no-op and one `unlock_connection` releases it.

use log::{debug, error, warn};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::error::{StoreError, StoreResult};
use crate::queries::{code_data, codes, ddl, imports, tags, DatabaseMode, QueryError};
use crate::records::{Code, CodeData, IdMap, ImportData, Tag};
use crate::schema::CodingTable;
use crate::store::{StoreConnection, StoreRow};

/// Mapping from a result row to a record
trait FromStoreRow: Sized {
    fn from_row(row: &StoreRow) -> StoreResult<Self>;
    fn key(&self) -> i64;
}

impl FromStoreRow for ImportData {
    fn from_row(row: &StoreRow) -> StoreResult<Self> {
        Ok(ImportData {
            id: row.get_i64("id")?,
            filename: row.get_string("filename")?,
            year: row.get_i32("year")?,
            family_id: row.get_i64("family_id")?,
            participant_number: row.get_i32("participant_number")?,
            alias: row.get_string("alias")?,
            date: row.get_date("date")?,
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl FromStoreRow for CodeData {
    fn from_row(row: &StoreRow) -> StoreResult<Self> {
        Ok(CodeData {
            id: row.get_i64("id")?,
            import_id: row.get_i64("import_id")?,
            time: row.get_u32("time")?,
            duration: row.get_u32("duration")?,
            code: Code::with_id(row.get_i64("code_id")?, row.get_string("name")?),
            comment: row.get_opt_string("comment")?,
        })
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl FromStoreRow for Code {
    fn from_row(row: &StoreRow) -> StoreResult<Self> {
        Ok(Code::with_id(row.get_i64("id")?, row.get_string("name")?))
    }

    fn key(&self) -> i64 {
        self.id
    }
}

impl FromStoreRow for Tag {
    fn from_row(row: &StoreRow) -> StoreResult<Self> {
        Ok(Tag::with_id(row.get_i64("id")?, row.get_string("value")?))
    }

    fn key(&self) -> i64 {
        self.id
    }
}

struct Session<C> {
    conn: C,
    owner: Option<ThreadId>,
}

impl<C: StoreConnection> Session<C> {
    fn open(&mut self) -> StoreResult<()> {
        if !self.conn.is_established() {
            self.conn.establish().inspect_err(|e| {
                error!("DAO unable to open database connection: {}", e);
            })?;
        }
        Ok(())
    }

    /// Close unless a lock is holding the connection open
    fn release(&mut self) -> StoreResult<()> {
        if self.owner.is_none() && self.conn.is_established() {
            self.conn.close().inspect_err(|e| {
                error!("DAO unable to close database connection: {}", e);
            })?;
        }
        Ok(())
    }
}

pub struct CodingDao<C: StoreConnection> {
    mode: DatabaseMode,
    session: Mutex<Session<C>>,
    released: Condvar,
}

impl<C: StoreConnection> CodingDao<C> {
    pub fn new(conn: C) -> Self {
        Self {
            mode: conn.mode(),
            session: Mutex::new(Session { conn, owner: None }),
            released: Condvar::new(),
        }
    }

    /// Backend the connection talks to; all statements are rendered for it
    pub fn mode(&self) -> DatabaseMode {
        self.mode
    }

    /// Wait until no other thread holds the connection lock
    fn acquire(&self) -> MutexGuard<'_, Session<C>> {
        let me = thread::current().id();
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        while session.owner.is_some_and(|owner| owner != me) {
            session = self
                .released
                .wait(session)
                .unwrap_or_else(PoisonError::into_inner);
        }
        session
    }

    /// Open if needed, run `op`, close unless locked. Errors are logged once here.
    fn run<T>(&self, operation: &str, op: impl FnOnce(&mut C) -> StoreResult<T>) -> StoreResult<T> {
        let mut session = self.acquire();
        let result = session.open().and_then(|()| op(&mut session.conn));
        let released = session.release();
        drop(session);

        let result = result.and_then(|value| released.map(|()| value));
        if let Err(e) = &result {
            error!("Unable to {}: {}", operation, e);
        }
        result
    }

    fn insert(&self, operation: &str, sql: String) -> Option<i64> {
        debug!("{}: {}", operation, sql);
        self.run(operation, |conn| {
            let rows = conn.query(&sql)?;
            let row = rows
                .first()
                .ok_or_else(|| StoreError::RowCount {
                    expected: 1,
                    actual: 0,
                })?;
            row.get_i64("id")
        })
        .ok()
    }

    fn select<T: FromStoreRow>(&self, operation: &str, sql: String) -> StoreResult<IdMap<T>> {
        self.run(operation, |conn| {
            conn.query(&sql)?
                .iter()
                .map(|row| T::from_row(row).map(|record| (record.key(), record)))
                .collect()
        })
    }

    /// Statements the builder refused never reach the store
    fn built(operation: &str, sql: Result<String, QueryError>) -> Option<String> {
        sql.inspect_err(|e| error!("Unable to {}: {}", operation, e)).ok()
    }

    /// Update or delete exactly one row
    fn write_one(&self, operation: &str, sql: Result<String, QueryError>) -> bool {
        let Some(sql) = Self::built(operation, sql) else {
            return false;
        };
        self.run(operation, |conn| match conn.execute(&sql)? {
            1 => Ok(()),
            actual => Err(StoreError::RowCount {
                expected: 1,
                actual,
            }),
        })
        .is_ok()
    }

    /// Insert a new import and return its generated id
    pub fn insert_import_data(&self, data: &ImportData) -> Option<i64> {
        self.insert("insert import data", imports::insert(data, self.mode))
    }

    /// Imports keyed by id. `0` returns every import.
    pub fn get_import_data(&self, import_id: i64) -> StoreResult<IdMap<ImportData>> {
        self.select("get import data", imports::select(import_id, self.mode))
    }

    pub fn update_import_data(&self, data: &ImportData) -> bool {
        self.write_one("update import data", imports::update(data, self.mode))
    }

    /// Insert a coded interval and return its generated id. Only `data.code.id` is stored.
    /// Insert a code data entry; fails when its import does not exist
    pub fn insert_code_data(&self, data: &CodeData) -> Option<i64> {
        let operation = "insert code data";
        let sql = Self::built(operation, code_data::insert(data, self.mode))?;
        self.insert(operation, sql)
    }

    /// Code data of one import, or of every import when `import_id` is `0`
    pub fn get_code_data_from_import(&self, import_id: i64) -> StoreResult<IdMap<CodeData>> {
        self.select(
            "get code data for import",
            code_data::select_by_import(import_id, self.mode),
        )
    }

    /// Code data of every import in a family, or all code data when `family_id` is `0`
    pub fn get_code_data_from_family_id(&self, family_id: i64) -> StoreResult<IdMap<CodeData>> {
        self.select(
            "get code data for family",
            code_data::select_by_family(family_id, self.mode),
        )
    }

    /// Fails when the entry is missing or its import does not exist
    pub fn update_code_data(&self, data: &CodeData) -> bool {
        self.write_one("update code data", code_data::update(data, self.mode))
    }

    pub fn insert_new_code(&self, code: &Code) -> Option<i64> {
        self.insert("insert new code", codes::insert(code, self.mode))
    }

    pub fn get_code(&self, code_id: i64) -> StoreResult<IdMap<Code>> {
        self.select("get code", codes::select(code_id, self.mode))
    }

    pub fn update_existing_code(&self, code: &Code) -> bool {
        self.write_one("update code", codes::update(code, self.mode))
    }

    pub fn delete_existing_code(&self, code: &Code) -> bool {
        self.write_one("delete code", codes::delete(code, self.mode))
    }

    pub fn insert_new_tag(&self, tag: &Tag) -> Option<i64> {
        self.insert("insert new tag", tags::insert(tag, self.mode))
    }

    pub fn get_tag(&self, tag_id: i64) -> StoreResult<IdMap<Tag>> {
        self.select("get tag", tags::select(tag_id, self.mode))
    }

    pub fn update_existing_tag(&self, tag: &Tag) -> bool {
        self.write_one("update tag", tags::update(tag, self.mode))
    }

    pub fn delete_existing_tag(&self, tag: &Tag) -> bool {
        self.write_one("delete tag", tags::delete(tag, self.mode))
    }

    /// Create imports, data, codes and tags in that order over one connection.
    ///
    /// The first failing statement aborts the sequence. Tables created before
    /// it are left in place.
    pub fn create_tables(&self, mode: DatabaseMode) -> bool {
        if mode != self.mode {
            warn!(
                "Creating {:?} tables over a {:?} connection",
                mode, self.mode
            );
        }
        self.run("create database tables", |conn| {
            for table in CodingTable::ALL {
                conn.execute(&ddl::create_table(table, mode))?;
            }
            Ok(())
        })
        .is_ok()
    }

    /// Drop the four tables in creation order; same abort semantics as `create_tables`
    pub fn drop_tables(&self) -> bool {
        self.run("drop database tables", |conn| {
            for table in CodingTable::ALL {
                conn.execute(&ddl::drop_table(table, self.mode))?;
            }
            Ok(())
        })
        .is_ok()
    }

    /// True when a row-count probe succeeds against all four tables
    pub fn is_database_initialized(&self) -> bool {
        self.run("check database status", |conn| {
            for table in CodingTable::ALL {
                conn.query(&ddl::count_rows(table, self.mode))?;
            }
            Ok(())
        })
        .is_ok()
    }

    /// Open the connection now, without running a statement
    pub fn open_connection(&self) -> bool {
        self.acquire().open().is_ok()
    }

    /// Close the connection unless it is locked
    pub fn close_connection(&self) -> bool {
        self.acquire().release().is_ok()
    }

    /// Keep the connection open across calls; other threads wait until unlocked
    pub fn lock_connection(&self) {
        let mut session = self.acquire();
        session.owner = Some(thread::current().id());
    }

    /// Allow the connection to close again. Does not close it.
    pub fn unlock_connection(&self) {
        let me = thread::current().id();
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        match session.owner {
            Some(owner) if owner == me => {
                session.owner = None;
                self.released.notify_all();
            }
            Some(_) => warn!("unlock_connection called by a thread that does not hold the lock"),
            None => {}
        }
    }

    pub fn is_connection_locked(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .owner
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cell;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        opens: AtomicUsize,
        closes: AtomicUsize,
        statements: Mutex<Vec<String>>,
    }

    impl Calls {
        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    /// In-memory store that replays scripted results and counts session calls
    #[derive(Default)]
    struct ScriptedConnection {
        established: bool,
        calls: Arc<Calls>,
        queries: VecDeque<StoreResult<Vec<StoreRow>>>,
        executes: VecDeque<StoreResult<u64>>,
    }

    impl ScriptedConnection {
        fn new() -> (Self, Arc<Calls>) {
            let conn = Self::default();
            let calls = conn.calls.clone();
            (conn, calls)
        }

        fn query_result(mut self, result: StoreResult<Vec<StoreRow>>) -> Self {
            self.queries.push_back(result);
            self
        }

        fn execute_result(mut self, result: StoreResult<u64>) -> Self {
            self.executes.push_back(result);
            self
        }
    }

    impl StoreConnection for ScriptedConnection {
        fn mode(&self) -> DatabaseMode {
            DatabaseMode::Sqlite
        }

        fn is_established(&self) -> bool {
            self.established
        }

        fn establish(&mut self) -> StoreResult<()> {
            self.calls.opens.fetch_add(1, Ordering::SeqCst);
            self.established = true;
            Ok(())
        }

        fn close(&mut self) -> StoreResult<()> {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            self.established = false;
            Ok(())
        }

        fn execute(&mut self, sql: &str) -> StoreResult<u64> {
            self.calls.statements.lock().unwrap().push(sql.to_string());
            self.executes.pop_front().unwrap_or(Ok(1))
        }

        fn query(&mut self, sql: &str) -> StoreResult<Vec<StoreRow>> {
            self.calls.statements.lock().unwrap().push(sql.to_string());
            self.queries.pop_front().unwrap_or(Ok(Vec::new()))
        }
    }

    fn code_row(id: i64, name: &str) -> StoreRow {
        StoreRow::new()
            .with("id", Cell::Integer(id))
            .with("name", Cell::Text(name.to_string()))
    }

    #[test]
    fn test_each_call_opens_and_closes() {
        let (conn, calls) = ScriptedConnection::new();
        let dao = CodingDao::new(conn);

        dao.get_code(0).unwrap();
        dao.get_tag(0).unwrap();

        assert_eq!(calls.opens(), 2);
        assert_eq!(calls.closes(), 2);
    }

    #[test]
    fn test_locked_calls_share_one_session() {
        let (conn, calls) = ScriptedConnection::new();
        let dao = CodingDao::new(conn);

        dao.lock_connection();
        dao.get_import_data(0).unwrap();
        dao.get_code(0).unwrap();
        dao.get_tag(0).unwrap();
        dao.get_code_data_from_import(0).unwrap();
        assert!(dao.close_connection());
        assert_eq!(calls.opens(), 1);
        assert_eq!(calls.closes(), 0);

        dao.unlock_connection();
        assert!(!dao.is_connection_locked());
        assert!(dao.close_connection());
        assert_eq!(calls.opens(), 1);
        assert_eq!(calls.closes(), 1);
    }

    #[test]
    fn test_lock_is_single_layer() {
        let (conn, calls) = ScriptedConnection::new();
        let dao = CodingDao::new(conn);

        dao.lock_connection();
        dao.lock_connection();
        dao.get_code(0).unwrap();
        dao.unlock_connection();
        dao.get_code(0).unwrap();

        assert_eq!(calls.opens(), 1);
        assert_eq!(calls.closes(), 1);
    }

    #[test]
    fn test_select_distinguishes_empty_from_failure() {
        let (conn, _calls) = ScriptedConnection::new();
        let conn = conn
            .query_result(Ok(Vec::new()))
            .query_result(Err(StoreError::Statement("no such table: codes".into())));
        let dao = CodingDao::new(conn);

        assert!(dao.get_code(99).unwrap().is_empty());
        assert!(matches!(dao.get_code(99), Err(StoreError::Statement(_))));
    }

    #[test]
    fn test_select_maps_rows_by_id() {
        let (conn, _calls) = ScriptedConnection::new();
        let conn = conn.query_result(Ok(vec![code_row(2, "Smile"), code_row(5, "Cry")]));
        let dao = CodingDao::new(conn);

        let codes = dao.get_code(0).unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[&5], Code::with_id(5, "Cry"));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let (conn, _calls) = ScriptedConnection::new();
        let row = StoreRow::new().with("id", Cell::Integer(1));
        let conn = conn.query_result(Ok(vec![row]));
        let dao = CodingDao::new(conn);

        assert!(matches!(dao.get_tag(0), Err(StoreError::Mapping { .. })));
    }

    #[test]
    fn test_insert_returns_generated_key_or_none() {
        let (conn, _calls) = ScriptedConnection::new();
        let conn = conn
            .query_result(Ok(vec![StoreRow::new().with("id", Cell::Integer(12))]))
            .query_result(Err(StoreError::Statement("constraint failed".into())));
        let dao = CodingDao::new(conn);

        assert_eq!(dao.insert_new_tag(&Tag::new("noisy")), Some(12));
        assert_eq!(dao.insert_new_tag(&Tag::new("noisy")), None);
    }

    #[test]
    fn test_insert_without_returned_row_is_none() {
        let (conn, calls) = ScriptedConnection::new();
        let conn = conn.query_result(Ok(Vec::new()));
        let dao = CodingDao::new(conn);

        let entry = CodeData::new(999, 0, 10, Code::with_id(1, "Smile"), None);
        assert_eq!(dao.insert_code_data(&entry), None);
        assert_eq!(calls.statements().len(), 1);
    }

    #[test]
    fn test_update_with_unset_id_never_reaches_store() {
        let (conn, calls) = ScriptedConnection::new();
        let dao = CodingDao::new(conn);

        assert!(!dao.update_existing_code(&Code::new("Smile")));
        assert!(!dao.delete_existing_tag(&Tag::new("noisy")));
        assert_eq!(calls.opens(), 0);
        assert!(calls.statements().is_empty());
    }

    #[test]
    fn test_update_matching_no_row_fails() {
        let (conn, _calls) = ScriptedConnection::new();
        let conn = conn.execute_result(Ok(0)).execute_result(Ok(1));
        let dao = CodingDao::new(conn);

        let code = Code::with_id(3, "Smile");
        assert!(!dao.update_existing_code(&code));
        assert!(dao.update_existing_code(&code));
    }

    #[test]
    fn test_create_tables_stops_at_first_failure() {
        let (conn, calls) = ScriptedConnection::new();
        let conn = conn
            .execute_result(Ok(0))
            .execute_result(Err(StoreError::Statement("disk full".into())));
        let dao = CodingDao::new(conn);

        assert!(!dao.create_tables(DatabaseMode::Sqlite));
        let statements = calls.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("\"imports\""));
        assert!(statements[1].contains("\"data\""));
        assert_eq!(calls.closes(), 1);
    }

    #[test]
    fn test_initialized_probe_fails_on_any_table() {
        let (conn, _calls) = ScriptedConnection::new();
        let conn = conn
            .query_result(Ok(Vec::new()))
            .query_result(Ok(Vec::new()))
            .query_result(Err(StoreError::Statement("no such table: codes".into())));
        let dao = CodingDao::new(conn);

        assert!(!dao.is_database_initialized());
        assert!(dao.is_database_initialized());
    }

    #[test]
    fn test_lock_excludes_other_threads() {
        let (conn, calls) = ScriptedConnection::new();
        let dao = Arc::new(CodingDao::new(conn));
        dao.lock_connection();

        let finished = Arc::new(AtomicBool::new(false));
        let worker = {
            let dao = dao.clone();
            let finished = finished.clone();
            thread::spawn(move || {
                dao.get_code(0).unwrap();
                finished.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!finished.load(Ordering::SeqCst));

        dao.unlock_connection();
        worker.join().unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(calls.closes(), 1);
    }
}
