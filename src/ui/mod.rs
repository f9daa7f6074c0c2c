use crate::models::DataTable;

pub mod app;
pub use app::run_dashboard;

/// One dashboard tab: a titled table plus a status note (fetch outcome
/// counts, cache provenance, ...).
#[derive(Debug, Clone)]
pub struct TabContent {
    pub title: String,
    pub key_header: String,
    pub table: DataTable,
    pub note: String,
}

impl TabContent {
    pub fn new(
        title: impl Into<String>,
        key_header: impl Into<String>,
        table: DataTable,
        note: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            key_header: key_header.into(),
            table,
            note: note.into(),
        }
    }
}
