// Library interface for the coding store binary and tests

pub mod cache;
pub mod config;
pub mod credentials;
pub mod dao;
pub mod db;
pub mod db_postgres;
pub mod error;
pub mod queries;
pub mod records;
pub mod schema;
pub mod store;

pub use cache::{CodingSource, Collection, ModelCache};
pub use dao::CodingDao;
pub use error::{StoreError, StoreResult};
pub use queries::DatabaseMode;
pub use records::{Code, CodeData, IdMap, ImportData, Tag, UNSET_ID};
