//! Denormalized read views of users and events.

use log::{debug, o};
use serde::Serialize;

use crate::db::DynDb;
use crate::environment::{Environment, VecStore};
use crate::errors::BackendError;
use crate::models::{Event, EventId, Location, User, UserId};
use crate::params::Params;
use crate::parse::{parse_integer, parse_wide_integer};
use crate::resolve::resolve_by_id;

const MISSING_ID: &str = "missing id argument";

#[derive(Debug, PartialEq, Serialize)]
pub struct UserView {
    pub uid: UserId,
    pub first_name: String,
    pub last_name: String,

    /// The public URL of the profile picture.
    pub prof_pic: Option<String>,

    pub friends: Vec<UserId>,
    pub participating: Vec<EventId>,
}

/// The short form of a user embedded in event views.
#[derive(Debug, PartialEq, Serialize)]
pub struct UserSummary {
    pub uid: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            uid: user.uid,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct EventView {
    pub eid: EventId,
    pub title: String,
    pub description: String,

    /// Milliseconds since the Unix epoch.
    pub date_time: i64,

    pub host: UserSummary,
    pub participants: Vec<UserSummary>,
    pub locations: Vec<Location>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct UserEventsView {
    pub uid: UserId,
    pub events: Vec<EventView>,
}

pub async fn get_user<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<UserView, BackendError> {
    let db = &*environment.db;
    let uid = user_id(params)?;
    debug!(environment.logger, "Retrieving user..."; "uid" => uid);

    let user = db
        .retrieve_user(uid)
        .await?
        .ok_or_else(|| BackendError::not_found("invalid user"))?;

    user_view(db, &*environment.store, user).await
}

pub async fn get_event<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<EventView, BackendError> {
    let db = &*environment.db;

    let eid = params
        .get("eid")
        .ok_or_else(|| BackendError::validation(MISSING_ID))?;
    let eid = parse_integer(eid).ok_or_else(|| BackendError::parse("invalid event"))?;
    debug!(environment.logger, "Retrieving event..."; "eid" => eid);

    let event = db
        .retrieve_event(eid)
        .await?
        .ok_or_else(|| BackendError::not_found("invalid event"))?;

    event_view(db, event).await
}

/// Lists every event the user participates in.
pub async fn get_user_events<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<UserEventsView, BackendError> {
    let db = &*environment.db;
    let uid = user_id(params)?;
    let logger = environment.logger.new(o!("uid" => uid));

    debug!(logger, "Retrieving user...");
    db.retrieve_user(uid)
        .await?
        .ok_or_else(|| BackendError::not_found("user does not exist"))?;

    debug!(logger, "Retrieving events...");
    let mut events = Vec::new();
    for event in db.participating(uid).await? {
        events.push(event_view(db, event).await?);
    }

    Ok(UserEventsView { uid, events })
}

fn user_id<P: Params + ?Sized>(params: &P) -> Result<UserId, BackendError> {
    let raw = params
        .get("uid")
        .ok_or_else(|| BackendError::validation(MISSING_ID))?;

    parse_wide_integer(raw).ok_or_else(|| BackendError::parse("invalid user"))
}

async fn user_view(db: &DynDb, store: &VecStore, user: User) -> Result<UserView, BackendError> {
    let prof_pic = match &user.prof_pic {
        Some(key) => Some(
            store
                .get_url(key)
                .map_err(|source| BackendError::FailedToGenerateUrl { source })?
                .to_string(),
        ),
        None => None,
    };

    let friends = db.friends(user.uid).await?;
    let participating = db
        .participating(user.uid)
        .await?
        .into_iter()
        .map(|event| event.eid)
        .collect();

    Ok(UserView {
        uid: user.uid,
        first_name: user.first_name,
        last_name: user.last_name,
        prof_pic,
        friends,
        participating,
    })
}

async fn event_view(db: &DynDb, event: Event) -> Result<EventView, BackendError> {
    let host: User = resolve_by_id(db, event.host, "host").await?;
    let participants = db.participants(event.eid).await?;
    let locations = db.locations(event.eid).await?;

    Ok(EventView {
        eid: event.eid,
        title: event.title,
        description: event.description,
        date_time: event.date_time.unix_timestamp() * 1000,
        host: host.into(),
        participants: participants.into_iter().map(UserSummary::from).collect(),
        locations,
    })
}

#[cfg(test)]
mod tests {
    use super::{get_event, get_user, get_user_events};
    use crate::db::Db;
    use crate::testing::{fixture, params, seed_event, seed_user};

    #[tokio::test]
    async fn argument_errors() {
        let fixture = fixture();
        let environment = &fixture.environment;

        let error = get_user(environment, &params(&[])).await.expect_err("no uid");
        assert_eq!(error.to_string(), "missing id argument");

        let error = get_user(environment, &params(&[("uid", "me")])).await.expect_err("bad uid");
        assert_eq!(error.to_string(), "invalid user");

        let error = get_user(environment, &params(&[("uid", "3")])).await.expect_err("missing user");
        assert_eq!(error.to_string(), "invalid user");

        let error = get_event(environment, &params(&[("eid", "x")])).await.expect_err("bad eid");
        assert_eq!(error.to_string(), "invalid event");

        let error = get_user_events(environment, &params(&[("uid", "3")]))
            .await
            .expect_err("missing user");
        assert_eq!(error.to_string(), "user does not exist");
    }

    #[tokio::test]
    async fn views_are_denormalized() {
        let fixture = fixture();
        let environment = &fixture.environment;
        let db = &*environment.db;

        seed_user(db, 1).await;
        seed_user(db, 2).await;
        db.set_profile_picture(1, Some(String::from("profpic_1.jpg")))
            .await
            .expect("set picture");
        let eid = seed_event(db, 1).await;

        let user = get_user(environment, &params(&[("uid", "1")]))
            .await
            .expect("get user");
        assert_eq!(user.prof_pic.as_deref(), Some("http://store.test/profpic_1.jpg"));
        assert_eq!(user.participating, vec![eid]);

        let event = get_event(environment, &params(&[("eid", eid.to_string().as_str())]))
            .await
            .expect("get event");
        assert_eq!(event.host.uid, 1);
        assert_eq!(event.date_time, 0);
        assert_eq!(event.participants.len(), 1);

        let events = get_user_events(environment, &params(&[("uid", "2")]))
            .await
            .expect("get user events");
        assert_eq!(events.uid, 2);
        assert!(events.events.is_empty());
    }
}
