use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::edit_buffer::EditBuffer;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The class-term/subject the edit buffer currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSelection {
    pub class_term_id: String,
    pub subject_id: String,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub edit_buffer: EditBuffer,
    pub edit_selection: Option<EditSelection>,
}

impl AppState {
    /// Switching workspace drops any open edit session.
    pub fn select_workspace(&mut self, path: PathBuf, conn: Connection) {
        self.workspace = Some(path);
        self.db = Some(conn);
        self.edit_buffer = crate::edit_buffer::reduce(
            std::mem::take(&mut self.edit_buffer),
            crate::edit_buffer::EditAction::ClearAll,
        );
        self.edit_selection = None;
    }
}
