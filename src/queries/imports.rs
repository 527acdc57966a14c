use sea_query::{Expr, Order, Query};

use super::{render, require_id, DatabaseMode, QueryError};
use crate::records::{ImportData, UNSET_ID};
use crate::schema::Imports;

const COLUMNS: [Imports; 7] = [
    Imports::Id,
    Imports::Filename,
    Imports::Year,
    Imports::FamilyId,
    Imports::ParticipantNumber,
    Imports::Alias,
    Imports::Date,
];

/// INSERT INTO imports (filename, year, family_id, participant_number, alias, date)
/// VALUES (?, ?, ?, ?, ?, ?) RETURNING id
pub fn insert(data: &ImportData, mode: DatabaseMode) -> String {
    let stmt = Query::insert()
        .into_table(Imports::Table)
        .columns([
            Imports::Filename,
            Imports::Year,
            Imports::FamilyId,
            Imports::ParticipantNumber,
            Imports::Alias,
            Imports::Date,
        ])
        .values_panic([
            data.filename.as_str().into(),
            data.year.into(),
            data.family_id.into(),
            data.participant_number.into(),
            data.alias.as_str().into(),
            data.date.into(),
        ])
        .returning_col(Imports::Id)
        .to_owned();
    render!(stmt, mode)
}

/// SELECT id, filename, year, family_id, participant_number, alias, date FROM imports
/// [WHERE id = ?] ORDER BY id
pub fn select(import_id: i64, mode: DatabaseMode) -> String {
    let mut stmt = Query::select();
    stmt.columns(COLUMNS)
        .from(Imports::Table)
        .order_by(Imports::Id, Order::Asc);
    if import_id != UNSET_ID {
        stmt.and_where(Expr::col(Imports::Id).eq(import_id));
    }
    render!(stmt, mode)
}

/// UPDATE imports SET filename = ?, year = ?, family_id = ?, participant_number = ?,
/// alias = ?, date = ? WHERE id = ?
pub fn update(data: &ImportData, mode: DatabaseMode) -> Result<String, QueryError> {
    let id = require_id("imports", data.id)?;
    let stmt = Query::update()
        .table(Imports::Table)
        .values([
            (Imports::Filename, data.filename.as_str().into()),
            (Imports::Year, data.year.into()),
            (Imports::FamilyId, data.family_id.into()),
            (Imports::ParticipantNumber, data.participant_number.into()),
            (Imports::Alias, data.alias.as_str().into()),
            (Imports::Date, data.date.into()),
        ])
        .and_where(Expr::col(Imports::Id).eq(id))
        .to_owned();
    Ok(render!(stmt, mode))
}
