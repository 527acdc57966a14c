use sea_query::{Expr, Order, Query, SelectStatement, SimpleExpr};

use super::{render, require_id, DatabaseMode, QueryError};
use crate::records::{CodeData, UNSET_ID};
use crate::schema::{Codes, Data, Imports};

/// EXISTS (SELECT 1 FROM imports WHERE imports.id = ?)
fn import_exists(import_id: i64) -> SimpleExpr {
    Expr::exists(
        Query::select()
            .expr(Expr::val(1))
            .from(Imports::Table)
            .and_where(Expr::col((Imports::Table, Imports::Id)).eq(import_id))
            .to_owned(),
    )
}

/// INSERT INTO data (import_id, time, duration, code_id, comment)
/// SELECT ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM imports WHERE imports.id = ?) RETURNING id
///
/// Returns no row when the import does not exist.
pub fn insert(data: &CodeData, mode: DatabaseMode) -> Result<String, QueryError> {
    let row = Query::select()
        .exprs([
            Expr::val(data.import_id),
            Expr::val(data.time),
            Expr::val(data.duration),
            Expr::val(data.code.id),
            Expr::val(data.comment.clone()),
        ])
        .and_where(import_exists(data.import_id))
        .to_owned();
    let stmt = Query::insert()
        .into_table(Data::Table)
        .columns([
            Data::ImportId,
            Data::Time,
            Data::Duration,
            Data::CodeId,
            Data::Comment,
        ])
        .select_from(row)
        .map_err(|e| QueryError::Build(e.to_string()))?
        .returning_col(Data::Id)
        .to_owned();
    Ok(render!(stmt, mode))
}

/// SELECT data.id, data.import_id, data.time, data.duration, data.code_id, data.comment, codes.name
/// FROM data INNER JOIN codes ON data.code_id = codes.id
///           INNER JOIN imports ON data.import_id = imports.id
fn select_joined() -> SelectStatement {
    Query::select()
        .columns([
            (Data::Table, Data::Id),
            (Data::Table, Data::ImportId),
            (Data::Table, Data::Time),
            (Data::Table, Data::Duration),
            (Data::Table, Data::CodeId),
            (Data::Table, Data::Comment),
        ])
        .column((Codes::Table, Codes::Name))
        .from(Data::Table)
        .inner_join(
            Codes::Table,
            Expr::col((Data::Table, Data::CodeId)).equals((Codes::Table, Codes::Id)),
        )
        .inner_join(
            Imports::Table,
            Expr::col((Data::Table, Data::ImportId)).equals((Imports::Table, Imports::Id)),
        )
        .order_by((Data::Table, Data::Id), Order::Asc)
        .to_owned()
}

/// ... [WHERE data.import_id = ?]
pub fn select_by_import(import_id: i64, mode: DatabaseMode) -> String {
    let mut stmt = select_joined();
    if import_id != UNSET_ID {
        stmt.and_where(Expr::col((Data::Table, Data::ImportId)).eq(import_id));
    }
    render!(stmt, mode)
}

/// ... [WHERE imports.family_id = ?]
pub fn select_by_family(family_id: i64, mode: DatabaseMode) -> String {
    let mut stmt = select_joined();
    if family_id != UNSET_ID {
        stmt.and_where(Expr::col((Imports::Table, Imports::FamilyId)).eq(family_id));
    }
    render!(stmt, mode)
}

/// UPDATE data SET import_id = ?, time = ?, duration = ?, code_id = ?, comment = ?
/// WHERE id = ? AND EXISTS (SELECT 1 FROM imports WHERE imports.id = ?)
pub fn update(data: &CodeData, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("data", data.id)?;
    let stmt = Query::update()
        .table(Data::Table)
        .values([
            (Data::ImportId, data.import_id.into()),
            (Data::Time, data.time.into()),
            (Data::Duration, data.duration.into()),
            (Data::CodeId, data.code.id.into()),
            (Data::Comment, data.comment.clone().into()),
        ])
        .and_where(Expr::col(Data::Id).eq(id))
        .and_where(import_exists(data.import_id))
        .to_owned();
    Ok(render!(stmt, mode))
}
