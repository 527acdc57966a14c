//! Domain records mirrored by the store and the model cache.
//!
//! Identifiers are assigned by the store. A record that has not been inserted
//! yet carries [`UNSET_ID`], which is also the "match all" filter value for
//! select operations.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder id for records that have not been stored yet
pub const UNSET_ID: i64 = 0;

/// Records keyed by their store id, iterated in id order
pub type IdMap<T> = BTreeMap<i64, T>;

/// One recorded observation session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportData {
    pub id: i64,
    pub filename: String,
    pub year: i32,
    pub family_id: i64,
    pub participant_number: i32,
    pub alias: String,
    pub date: NaiveDate,
}

impl ImportData {
    pub fn new(
        filename: impl Into<String>,
        year: i32,
        family_id: i64,
        participant_number: i32,
        alias: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: UNSET_ID,
            filename: filename.into(),
            year,
            family_id,
            participant_number,
            alias: alias.into(),
            date,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

/// A reusable behavior category
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code {
    pub id: i64,
    pub name: String,
}

impl Code {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UNSET_ID,
            name: name.into(),
        }
    }

    pub fn with_id(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A reusable free-form annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: i64,
    pub value: String,
}

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: UNSET_ID,
            value: value.into(),
        }
    }

    pub fn with_id(id: i64, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// One application of a code to an interval of an import.
///
/// `time` and `duration` are milliseconds; the coded interval is
/// `time..time + duration`. The embedded code is resolved by joining the codes
/// table when the entry is read, so only `code.id` matters on writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeData {
    pub id: i64,
    pub import_id: i64,
    pub time: u32,
    pub duration: u32,
    pub code: Code,
    pub comment: Option<String>,
}

impl CodeData {
    pub fn new(
        import_id: i64,
        time: u32,
        duration: u32,
        code: Code,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: UNSET_ID,
            import_id,
            time,
            duration,
            code,
            comment,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// End of the coded interval in milliseconds
    pub fn end_time(&self) -> u64 {
        u64::from(self.time) + u64::from(self.duration)
    }
}
