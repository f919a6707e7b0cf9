use warp::reject;

use crate::errors::Failure;
use crate::routes::response::ErrorResponse;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) failure: Failure,
}

impl Rejection {
    pub fn new(context: Context, failure: impl Into<Failure>) -> Self {
        Rejection {
            context,
            failure: failure.into(),
        }
    }

    pub fn flatten(&self) -> ErrorResponse {
        ErrorResponse {
            error: format!("{}", self.failure.error),
            uid: self.failure.uid,
        }
    }
}

impl reject::Reject for Rejection {}

/// The operation that failed.
#[derive(Clone, Copy, Debug)]
pub enum Context {
    GetUser,
    GetEvent,
    GetUserEvents,
    CreateEvent,
    EditEvent,
    CreateUser,
    EditUser,
    DeleteEvent,
    DeleteUser,
    CollectOrphans,
}
