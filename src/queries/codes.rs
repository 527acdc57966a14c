use sea_query::{Expr, Order, Query};

use super::{render, require_id, DatabaseMode, QueryError};
use crate::records::{Code, UNSET_ID};
use crate::schema::Codes;

/// INSERT INTO codes (name) VALUES (?) RETURNING id
pub fn insert(code: &Code, mode: DatabaseMode) -> String {
    let stmt = Query::insert()
        .into_table(Codes::Table)
        .columns([Codes::Name])
        .values_panic([code.name.as_str().into()])
        .returning_col(Codes::Id)
        .to_owned();
    render!(stmt, mode)
}

/// SELECT id, name FROM codes [WHERE id = ?] ORDER BY id
pub fn select(code_id: i64, mode: DatabaseMode) -> String {
    let mut stmt = Query::select();
    stmt.columns([Codes::Id, Codes::Name])
        .from(Codes::Table)
        .order_by(Codes::Id, Order::Asc);
    if code_id != UNSET_ID {
        stmt.and_where(Expr::col(Codes::Id).eq(code_id));
    }
    render!(stmt, mode)
}

/// UPDATE codes SET name = ? WHERE id = ?
pub fn update(code: &Code, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("codes", code.id)?;
    let stmt = Query::update()
        .table(Codes::Table)
        .value(Codes::Name, code.name.as_str())
        .and_where(Expr::col(Codes::Id).eq(id))
        .to_owned();
    Ok(render!(stmt, mode))
}

/// DELETE FROM codes WHERE id = ?
pub fn delete(code: &Code, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("codes", code.id)?;
    let stmt = Query::delete()
        .from_table(Codes::Table)
        .and_where(Expr::col(Codes::Id).eq(id))
        .to_owned();
    Ok(render!(stmt, mode))
}
