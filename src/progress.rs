pub mod chapters;
pub mod deadline;

use std::fmt;

pub use chapters::ChapterSet;
pub use deadline::Deadline;

use crate::entity::{Field, FieldKey};
use crate::error::{Error, Result};

/// The value a toggle changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProgressState {
    Completed(bool),
    Chapters(ChapterSet),
    Deadline(Deadline),
}

impl ProgressState {
    pub fn field(&self) -> Field {
        match self {
            ProgressState::Completed(_) => Field::Completed,
            ProgressState::Chapters(_) => Field::CompletedChapters,
            ProgressState::Deadline(_) => Field::Deadline,
        }
    }

    /// Reject a value that cannot be displayed in `key`'s field.
    pub fn check_for(&self, key: &FieldKey) -> Result<()> {
        if self.field() != key.field {
            return Err(Error::validation(format!("{self} is not a valid value for {key}")));
        }
        Ok(())
    }

    pub fn as_completed(&self) -> Option<bool> {
        match self {
            ProgressState::Completed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_chapters(&self) -> Option<&ChapterSet> {
        match self {
            ProgressState::Chapters(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_deadline(&self) -> Option<Deadline> {
        match self {
            ProgressState::Deadline(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressState::Completed(v) => write!(f, "completed={v}"),
            ProgressState::Chapters(s) => {
                let list: Vec<String> = s.iter().map(|i| i.to_string()).collect();
                write!(f, "chapters={{{}}}", list.join(","))
            }
            ProgressState::Deadline(d) => match d.timestamp() {
                Some(ts) => write!(f, "deadline={ts}"),
                None => f.write_str("deadline=none"),
            },
        }
    }
}
