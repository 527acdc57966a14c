//! Store boundary: a connection handle that can be opened, closed and asked to
//! run SQL text, plus the backend-neutral row type results are mapped from.

use chrono::NaiveDate;

use crate::error::{StoreError, StoreResult};
use crate::queries::DatabaseMode;

/// A single column value as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    Blob(Vec<u8>),
}

impl Cell {
    fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "NULL",
            Cell::Integer(_) => "integer",
            Cell::Real(_) => "real",
            Cell::Text(_) => "text",
            Cell::Date(_) => "date",
            Cell::Blob(_) => "blob",
        }
    }
}

/// One result row with named columns.
///
/// Accessors fail with [`StoreError::Mapping`] instead of defaulting, so a
/// schema mismatch surfaces as an error rather than a zeroed record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    columns: Vec<(String, Cell)>,
}

impl StoreRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, cell: Cell) {
        self.columns.push((name.into(), cell));
    }

    pub fn with(mut self, name: impl Into<String>, cell: Cell) -> Self {
        self.push(name, cell);
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn cell(&self, column: &str) -> StoreResult<&Cell> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
            .ok_or_else(|| StoreError::mapping(column, "column not present in result row"))
    }

    pub fn get_i64(&self, column: &str) -> StoreResult<i64> {
        match self.cell(column)? {
            Cell::Integer(v) => Ok(*v),
            other => Err(type_mismatch(column, "integer", other)),
        }
    }

    pub fn get_i32(&self, column: &str) -> StoreResult<i32> {
        let value = self.get_i64(column)?;
        i32::try_from(value)
            .map_err(|_| StoreError::mapping(column, format!("{value} does not fit in i32")))
    }

    pub fn get_u32(&self, column: &str) -> StoreResult<u32> {
        let value = self.get_i64(column)?;
        u32::try_from(value)
            .map_err(|_| StoreError::mapping(column, format!("{value} is not a valid u32")))
    }

    pub fn get_string(&self, column: &str) -> StoreResult<String> {
        match self.cell(column)? {
            Cell::Text(v) => Ok(v.clone()),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    pub fn get_opt_string(&self, column: &str) -> StoreResult<Option<String>> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Text(v) => Ok(Some(v.clone())),
            other => Err(type_mismatch(column, "text", other)),
        }
    }

    /// SQLite keeps dates as `YYYY-MM-DD` text; PostgreSQL returns a native date
    pub fn get_date(&self, column: &str) -> StoreResult<NaiveDate> {
        match self.cell(column)? {
            Cell::Date(d) => Ok(*d),
            Cell::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| StoreError::mapping(column, format!("invalid date {s:?}: {e}"))),
            other => Err(type_mismatch(column, "date", other)),
        }
    }
}

fn type_mismatch(column: &str, expected: &str, found: &Cell) -> StoreError {
    StoreError::mapping(column, format!("expected {expected}, found {}", found.kind()))
}

/// A live handle to one relational store.
///
/// `establish` and `close` bracket a physical session; the DAO decides when to
/// call them. `execute` returns the number of affected rows, `query` the rows
/// produced (including those of `INSERT ... RETURNING`).
pub trait StoreConnection: Send {
    fn mode(&self) -> DatabaseMode;
    fn is_established(&self) -> bool;
    fn establish(&mut self) -> StoreResult<()>;
    fn close(&mut self) -> StoreResult<()>;
    fn execute(&mut self, sql: &str) -> StoreResult<u64>;
    fn query(&mut self, sql: &str) -> StoreResult<Vec<StoreRow>>;
}

impl<C: StoreConnection + ?Sized> StoreConnection for Box<C> {
    fn mode(&self) -> DatabaseMode {
        (**self).mode()
    }

    fn is_established(&self) -> bool {
        (**self).is_established()
    }

    fn establish(&mut self) -> StoreResult<()> {
        (**self).establish()
    }

    fn close(&mut self) -> StoreResult<()> {
        (**self).close()
    }

    fn execute(&mut self, sql: &str) -> StoreResult<u64> {
        (**self).execute(sql)
    }

    fn query(&mut self, sql: &str) -> StoreResult<Vec<StoreRow>> {
        (**self).query(sql)
    }
}
