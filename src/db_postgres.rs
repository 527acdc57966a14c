//! PostgreSQL store handle
//!
//! Mirrors the SQLite handle in db.rs but talks to a server through sqlx. The
//! DAO is synchronous, so the handle embeds a current-thread runtime and blocks
//! on each call.

use chrono::NaiveDate;
use log::debug;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use std::future::Future;
use std::str::FromStr;
use tokio::runtime::Runtime;

use crate::error::{StoreError, StoreResult};
use crate::queries::DatabaseMode;
use crate::store::{Cell, StoreConnection, StoreRow};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Build a full PostgreSQL connection URL with password and database
///
/// Takes a base URL like `postgres://user@host:5432` and inserts the password
/// and appends the database name.
pub fn build_postgres_url(base_url: &str, password: &str, database: &str) -> Result<String, DynError> {
    let url = url::Url::parse(base_url)?;

    let user = url.username();
    let host = url.host_str().ok_or("Missing host in postgres_url")?;
    let port = url.port().unwrap_or(5432);

    let full_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user,
        urlencoding::encode(password),
        host,
        port,
        database
    );

    Ok(full_url)
}

/// Synchronous PostgreSQL handle that owns a runtime for blocking operations.
/// One physical connection is opened by `establish` and dropped by `close`.
pub struct PgStoreConnection {
    options: PgConnectOptions,
    runtime: Runtime,
    conn: Option<PgConnection>,
}

impl PgStoreConnection {
    /// Prepare a handle for `base_url`/`database`; nothing is dialled until `establish`
    pub fn new(base_url: &str, password: &str, database: &str) -> Result<Self, DynError> {
        let full_url = build_postgres_url(base_url, password, database)?;
        let options = PgConnectOptions::from_str(&full_url)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            options,
            runtime,
            conn: None,
        })
    }

    fn block_on<F, T>(runtime: &Runtime, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        runtime.block_on(fut).map_err(StoreError::from)
    }

    fn live(&mut self) -> StoreResult<(&Runtime, &mut PgConnection)> {
        match self.conn.as_mut() {
            Some(conn) => Ok((&self.runtime, conn)),
            None => Err(StoreError::Connection(
                "PostgreSQL connection is not established".to_string(),
            )),
        }
    }
}

fn to_cell(row: &PgRow, idx: usize) -> StoreResult<Cell> {
    let column = row.column(idx);
    let name = column.name();
    let decode = |e: sqlx::Error| StoreError::mapping(name, e.to_string());
    let cell = match column.type_info().name() {
        "INT2" => row.try_get::<Option<i16>, _>(idx).map_err(decode)?.map(|v| Cell::Integer(v.into())),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map_err(decode)?.map(|v| Cell::Integer(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map_err(decode)?.map(Cell::Integer),
        "FLOAT4" | "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map_err(decode)?.map(Cell::Real),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx).map_err(decode)?.map(Cell::Text)
        }
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx).map_err(decode)?.map(Cell::Date),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(idx).map_err(decode)?.map(Cell::Blob),
        other => {
            return Err(StoreError::mapping(name, format!("unsupported column type {other}")));
        }
    };
    Ok(cell.unwrap_or(Cell::Null))
}

impl StoreConnection for PgStoreConnection {
    fn mode(&self) -> DatabaseMode {
        DatabaseMode::Postgres
    }

    fn is_established(&self) -> bool {
        self.conn.is_some()
    }

    fn establish(&mut self) -> StoreResult<()> {
        if self.conn.is_none() {
            debug!("Connecting to PostgreSQL database {:?}", self.options.get_database());
            let conn = self
                .runtime
                .block_on(PgConnection::connect_with(&self.options))
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if let Some(conn) = self.conn.take() {
            self.runtime
                .block_on(conn.close())
                .map_err(|e| StoreError::Connection(e.to_string()))?;
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> StoreResult<u64> {
        let (runtime, conn) = self.live()?;
        let result = Self::block_on(runtime, sqlx::query(sql).execute(conn))?;
        Ok(result.rows_affected())
    }

    fn query(&mut self, sql: &str) -> StoreResult<Vec<StoreRow>> {
        let (runtime, conn) = self.live()?;
        let rows = Self::block_on(runtime, sqlx::query(sql).fetch_all(conn))?;
        rows.iter()
            .map(|row| -> StoreResult<StoreRow> {
                let mut mapped = StoreRow::new();
                for idx in 0..row.columns().len() {
                    mapped.push(row.column(idx).name(), to_cell(row, idx)?);
                }
                Ok(mapped)
            })
            .collect()
    }
}
