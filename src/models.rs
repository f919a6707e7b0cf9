use serde::Serialize;
use time::OffsetDateTime;

/// An external-provider user ID.
pub type UserId = i64;

/// An auto-assigned event ID.
pub type EventId = i32;

/// An auto-assigned location ID.
pub type LocationId = i32;

/// Maximum length of short text columns.
pub const MAX_TEXT_LENGTH: usize = 255;

/// A single user in the database.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    /// The external ID. Never changes once created.
    pub uid: UserId,

    pub first_name: String,

    pub last_name: String,

    /// The store key of the profile picture, if any.
    pub prof_pic: Option<String>,
}

impl User {
    pub fn new(uid: UserId) -> Self {
        User {
            uid,
            first_name: String::new(),
            last_name: String::new(),
            prof_pic: None,
        }
    }
}

/// A single event in the database.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub eid: EventId,

    pub title: String,

    pub description: String,

    /// When the event takes place, in UTC.
    pub date_time: OffsetDateTime,

    /// The hosting user. Always one of the participants.
    pub host: UserId,
}

/// A candidate place for an event.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Location {
    /// `None` until the location is first saved.
    pub id: Option<LocationId>,

    pub lat: f64,

    pub lng: f64,

    pub friendly_name: String,

    pub link: String,

    pub num_votes: i32,

    /// The owning event. A saved location without one is an orphan.
    #[serde(skip)]
    pub event_id: Option<EventId>,
}

/// Everything written by a single event save.
#[derive(Clone, Debug)]
pub struct EventChanges {
    /// `None` to insert a new event.
    pub eid: Option<EventId>,

    pub title: String,

    pub description: String,

    pub date_time: OffsetDateTime,

    pub host: UserId,

    /// The complete new location set, if it should be replaced.
    pub locations: Option<Vec<Location>>,

    /// The complete new participant set, if it should be replaced.
    pub participants: Option<Vec<UserId>>,
}

/// Everything written by a single user save.
#[derive(Clone, Debug)]
pub struct UserChanges {
    pub user: User,

    /// Whether the row must be inserted rather than updated.
    pub create: bool,

    pub participating: Option<Vec<EventId>>,

    pub friends: Option<Vec<UserId>>,
}

/// Checks that `value` fits in a short text column.
pub(crate) fn check_length(name: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > MAX_TEXT_LENGTH {
        Err(format!(
            "{} must be at most {} characters",
            name, MAX_TEXT_LENGTH
        ))
    } else {
        Ok(())
    }
}
