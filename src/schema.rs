use sea_query::Iden;

/// Imports table - one row per recorded observation session
#[derive(Iden, Clone, Copy)]
pub enum Imports {
    Table,
    Id,
    Filename,
    Year,
    FamilyId,
    ParticipantNumber,
    Alias,
    Date,
}

/// Data table - timestamped applications of a code to an import
#[derive(Iden, Clone, Copy)]
pub enum Data {
    Table,
    Id,
    ImportId,
    Time,
    Duration,
    CodeId,
    Comment,
}

/// Codes table - reusable behavior categories
#[derive(Iden, Clone, Copy)]
pub enum Codes {
    Table,
    Id,
    Name,
}

/// Tags table - reusable free-form annotations
#[derive(Iden, Clone, Copy)]
pub enum Tags {
    Table,
    Id,
    Value,
}

/// The four tables in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingTable {
    Imports,
    Data,
    Codes,
    Tags,
}

impl CodingTable {
    /// Fixed order used for schema creation, drops and the initialization probe
    pub const ALL: [CodingTable; 4] = [
        CodingTable::Imports,
        CodingTable::Data,
        CodingTable::Codes,
        CodingTable::Tags,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CodingTable::Imports => "imports",
            CodingTable::Data => "data",
            CodingTable::Codes => "codes",
            CodingTable::Tags => "tags",
        }
    }
}
