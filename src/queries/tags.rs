use sea_query::{Expr, Order, Query};

use super::{render, require_id, DatabaseMode, QueryError};
use crate::records::{Tag, UNSET_ID};
use crate::schema::Tags;

/// INSERT INTO tags (value) VALUES (?) RETURNING id
pub fn insert(tag: &Tag, mode: DatabaseMode) -> String {
    let stmt = Query::insert()
        .into_table(Tags::Table)
        .columns([Tags::Value])
        .values_panic([tag.value.as_str().into()])
        .returning_col(Tags::Id)
        .to_owned();
    render!(stmt, mode)
}

/// SELECT id, value FROM tags [WHERE id = ?] ORDER BY id
pub fn select(tag_id: i64, mode: DatabaseMode) -> String {
    let mut stmt = Query::select();
    stmt.columns([Tags::Id, Tags::Value])
        .from(Tags::Table)
        .order_by(Tags::Id, Order::Asc);
    if tag_id != UNSET_ID {
        stmt.and_where(Expr::col(Tags::Id).eq(tag_id));
    }
    render!(stmt, mode)
}

/// UPDATE tags SET value = ? WHERE id = ?
pub fn update(tag: &Tag, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("tags", tag.id)?;
    let stmt = Query::update()
        .table(Tags::Table)
        .value(Tags::Value, tag.value.as_str())
        .and_where(Expr::col(Tags::Id).eq(id))
        .to_owned();
    Ok(render!(stmt, mode))
}

/// DELETE FROM tags WHERE id = ?
pub fn delete(tag: &Tag, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("tags", tag.id)?;
    let stmt = Query::delete()
        .from_table(Tags::Table)
        .and_where(Expr::col(Tags::Id).eq(id))
        .to_owned();
    Ok(render!(stmt, mode))
}
