//! XStream change messages
//!
//! One [`Message`] is produced per received LCR (or idle low-water mark).

use super::column::Row;
use super::scn::Scn;
use serde::Serialize;
use std::fmt;

/// Change message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Transaction commit
    Commit { scn: Scn },
    /// Row insert
    Insert {
        scn: Scn,
        owner: String,
        table: String,
        columns: Row,
    },
    /// Row delete; `columns` is the before image
    Delete {
        scn: Scn,
        owner: String,
        table: String,
        columns: Row,
    },
    /// Row update
    Update {
        scn: Scn,
        owner: String,
        table: String,
        old_columns: Row,
        new_columns: Row,
    },
    /// No pending change; the source advanced its low-water mark
    Heartbeat { scn: Scn },
}

impl Message {
    pub fn scn(&self) -> Scn {
        match self {
            Message::Commit { scn }
            | Message::Insert { scn, .. }
            | Message::Delete { scn, .. }
            | Message::Update { scn, .. }
            | Message::Heartbeat { scn } => *scn,
        }
    }

    /// Command name: `COMMIT`, `INSERT`, `DELETE`, `UPDATE` or `HEARTBEAT`.
    pub fn command(&self) -> &'static str {
        match self {
            Message::Commit { .. } => "COMMIT",
            Message::Insert { .. } => "INSERT",
            Message::Delete { .. } => "DELETE",
            Message::Update { .. } => "UPDATE",
            Message::Heartbeat { .. } => "HEARTBEAT",
        }
    }

    /// `OWNER.TABLE` for row changes.
    pub fn qualified_table(&self) -> Option<String> {
        match self {
            Message::Insert { owner, table, .. }
            | Message::Delete { owner, table, .. }
            | Message::Update { owner, table, .. } => Some(format!("{}.{}", owner, table)),
            Message::Commit { .. } | Message::Heartbeat { .. } => None,
        }
    }

    pub fn is_row_change(&self) -> bool {
        matches!(
            self,
            Message::Insert { .. } | Message::Delete { .. } | Message::Update { .. }
        )
    }

    /// Row image that carries new data, if any.
    pub(crate) fn data_row_mut(&mut self) -> Option<&mut Row> {
        match self {
            Message::Insert { columns, .. } | Message::Delete { columns, .. } => Some(columns),
            Message::Update { new_columns, .. } => Some(new_columns),
            Message::Commit { .. } | Message::Heartbeat { .. } => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CMD: {}\tSCN:{}", self.command(), self.scn())?;
        if let Some(table) = self.qualified_table() {
            write!(f, "\t{}", table)?;
        }
        Ok(())
    }
}

/// LCR command type as reported in the record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LcrCommand {
    Commit,
    Insert,
    Update,
    Delete,
    /// DDL, LOB operations and anything else the client does not turn into a message
    Other(String),
}

impl LcrCommand {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "COMMIT" => LcrCommand::Commit,
            "INSERT" => LcrCommand::Insert,
            "UPDATE" => LcrCommand::Update,
            "DELETE" => LcrCommand::Delete,
            other => LcrCommand::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LcrCommand::Commit => "COMMIT",
            LcrCommand::Insert => "INSERT",
            LcrCommand::Update => "UPDATE",
            LcrCommand::Delete => "DELETE",
            LcrCommand::Other(tag) => tag,
        }
    }
}
