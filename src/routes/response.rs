use serde::Serialize;

use crate::lookup::{EventView, UserEventsView, UserView};
use crate::models::{EventId, UserId};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Collected {
        removed: u64,
    },
    Event(EventView),
    EventSaved {
        status: Status,
        eid: EventId,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    User(UserView),
    UserEvents(UserEventsView),
    UserSaved {
        status: Status,
        uid: UserId,
    },
}

impl SuccessResponse<'_> {
    pub fn event_saved(eid: EventId) -> Self {
        SuccessResponse::EventSaved {
            status: Status::Ok,
            eid,
        }
    }

    pub fn user_saved(uid: UserId) -> Self {
        SuccessResponse::UserSaved {
            status: Status::Ok,
            uid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// The user a failed save had already written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
}
