use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::queries::DatabaseMode;
use crate::store::{Cell, StoreConnection, StoreRow};

/// Open a file-based database connection
/// Enables foreign keys
pub fn open_database_with_path(db_path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(db_path)
        .map_err(|e| StoreError::Connection(format!("{}: {}", db_path.display(), e)))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

/// SQLite store handle. The file is opened on `establish` and released on `close`.
pub struct SqliteConnection {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteConnection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn live(&self) -> StoreResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| StoreError::Connection("SQLite connection is not established".to_string()))
    }
}

fn to_cell(column: &str, value: ValueRef<'_>) -> StoreResult<Cell> {
    Ok(match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(v) => Cell::Integer(v),
        ValueRef::Real(v) => Cell::Real(v),
        ValueRef::Text(bytes) => Cell::Text(
            String::from_utf8(bytes.to_vec())
                .map_err(|e| StoreError::mapping(column, format!("invalid UTF-8: {e}")))?,
        ),
        ValueRef::Blob(bytes) => Cell::Blob(bytes.to_vec()),
    })
}

impl StoreConnection for SqliteConnection {
    fn mode(&self) -> DatabaseMode {
        DatabaseMode::Sqlite
    }

    fn is_established(&self) -> bool {
        self.conn.is_some()
    }

    fn establish(&mut self) -> StoreResult<()> {
        if self.conn.is_none() {
            debug!("Opening SQLite database {}", self.path.display());
            self.conn = Some(open_database_with_path(&self.path)?);
        }
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, e)) = conn.close() {
                self.conn = Some(conn);
                return Err(StoreError::Connection(e.to_string()));
            }
            debug!("Closed SQLite database {}", self.path.display());
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> StoreResult<u64> {
        let affected = self.live()?.execute(sql, [])?;
        Ok(affected as u64)
    }

    fn query(&mut self, sql: &str) -> StoreResult<Vec<StoreRow>> {
        let conn = self.live()?;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut mapped = StoreRow::new();
            for (idx, name) in names.iter().enumerate() {
                mapped.push(name.as_str(), to_cell(name, row.get_ref(idx)?)?);
            }
            out.push(mapped);
        }
        Ok(out)
    }
}
