//! Merges loosely structured request data with stored state.
//!
//! Every reconciler parses and resolves the whole request before
//! writing anything, so the first failure aborts with nothing persisted.
//! Saves of the same record are not coordinated with each other: the
//! last writer wins.

mod event;
mod location;
mod user;

pub use self::event::{create_event, edit_event};
pub use self::user::{create_user, edit_user};

/// Whether a reconciler creates a new record or edits an existing one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    Create,
    Edit,
}

impl Mode {
    fn is_create(self) -> bool {
        self == Mode::Create
    }
}
