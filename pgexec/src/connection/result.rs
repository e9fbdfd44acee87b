use crate::{column::MetaColumn, session::RawRow};

/// Buffered outcome of one statement execution.
#[derive(Debug, Default)]
pub struct PgResult {
    pub(crate) columns: Vec<MetaColumn>,
    pub(crate) rows: Vec<RawRow>,
    pub(crate) rows_affected: u64,
    pub(crate) tag: String,
}

impl PgResult {
    pub fn columns(&self) -> &[MetaColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Command tag, e.g. `INSERT 0 1`, empty for an empty query.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}
