use sea_query::{Alias, Asterisk, ColumnDef, Expr, Func, Iden, Query, Table};

use super::{render, DatabaseMode};
use crate::schema::{Codes, CodingTable, Data, Imports, Tags};

/// Store-assigned primary key.
/// SQLite only honours AUTOINCREMENT on `integer PRIMARY KEY`; PostgreSQL gets a bigserial.
fn id_column<T: Iden + 'static>(col: T, mode: DatabaseMode) -> ColumnDef {
    let mut def = ColumnDef::new(col);
    match mode {
        DatabaseMode::Sqlite => def.integer(),
        DatabaseMode::Postgres => def.big_integer(),
    };
    def.not_null().auto_increment().primary_key().to_owned()
}

/// Millisecond offsets are u32, which overflows a PostgreSQL `integer`
fn millis_column<T: Iden + 'static>(col: T, mode: DatabaseMode) -> ColumnDef {
    let mut def = ColumnDef::new(col);
    match mode {
        DatabaseMode::Sqlite => def.integer(),
        DatabaseMode::Postgres => def.big_integer(),
    };
    def.not_null().to_owned()
}

/// Foreign ids follow the width of the id they point at
fn ref_column<T: Iden + 'static>(col: T, mode: DatabaseMode) -> ColumnDef {
    millis_column(col, mode)
}

/// CREATE TABLE IF NOT EXISTS imports (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     filename TEXT NOT NULL,
///     year INTEGER NOT NULL,
///     family_id INTEGER NOT NULL,
///     participant_number INTEGER NOT NULL,
///     alias TEXT NOT NULL,
///     date DATE NOT NULL
/// )
pub fn create_imports_table(mode: DatabaseMode) -> String {
    let stmt = Table::create()
        .table(Imports::Table)
        .if_not_exists()
        .col(id_column(Imports::Id, mode))
        .col(ColumnDef::new(Imports::Filename).text().not_null())
        .col(ColumnDef::new(Imports::Year).integer().not_null())
        .col(ref_column(Imports::FamilyId, mode))
        .col(ColumnDef::new(Imports::ParticipantNumber).integer().not_null())
        .col(ColumnDef::new(Imports::Alias).text().not_null())
        .col(ColumnDef::new(Imports::Date).date().not_null())
        .to_owned();
    render!(stmt, mode)
}

/// CREATE TABLE IF NOT EXISTS data (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     import_id INTEGER NOT NULL,
///     time INTEGER NOT NULL,
///     duration INTEGER NOT NULL,
///     code_id INTEGER NOT NULL,
///     comment TEXT
/// )
/// References to imports and codes are resolved by joins at read time, so
/// codes stay deletable while entries still point at them.
pub fn create_data_table(mode: DatabaseMode) -> String {
    let stmt = Table::create()
        .table(Data::Table)
        .if_not_exists()
        .col(id_column(Data::Id, mode))
        .col(ref_column(Data::ImportId, mode))
        .col(millis_column(Data::Time, mode))
        .col(millis_column(Data::Duration, mode))
        .col(ref_column(Data::CodeId, mode))
        .col(ColumnDef::new(Data::Comment).text().null())
        .to_owned();
    render!(stmt, mode)
}

/// CREATE TABLE IF NOT EXISTS codes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)
pub fn create_codes_table(mode: DatabaseMode) -> String {
    let stmt = Table::create()
        .table(Codes::Table)
        .if_not_exists()
        .col(id_column(Codes::Id, mode))
        .col(ColumnDef::new(Codes::Name).text().not_null())
        .to_owned();
    render!(stmt, mode)
}

/// CREATE TABLE IF NOT EXISTS tags (id INTEGER PRIMARY KEY AUTOINCREMENT, value TEXT NOT NULL)
pub fn create_tags_table(mode: DatabaseMode) -> String {
    let stmt = Table::create()
        .table(Tags::Table)
        .if_not_exists()
        .col(id_column(Tags::Id, mode))
        .col(ColumnDef::new(Tags::Value).text().not_null())
        .to_owned();
    render!(stmt, mode)
}

/// CREATE statements in the fixed order imports, data, codes, tags
pub fn create_table(table: CodingTable, mode: DatabaseMode) -> String {
    match table {
        CodingTable::Imports => create_imports_table(mode),
        CodingTable::Data => create_data_table(mode),
        CodingTable::Codes => create_codes_table(mode),
        CodingTable::Tags => create_tags_table(mode),
    }
}

/// DROP TABLE IF EXISTS <table>
pub fn drop_table(table: CodingTable, mode: DatabaseMode) -> String {
    let stmt = Table::drop()
        .table(Alias::new(table.name()))
        .if_exists()
        .to_owned();
    render!(stmt, mode)
}

/// SELECT COUNT(*) FROM <table>, used to probe that the table exists
pub fn count_rows(table: CodingTable, mode: DatabaseMode) -> String {
    let stmt = Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Alias::new(table.name()))
        .to_owned();
    render!(stmt, mode)
}
