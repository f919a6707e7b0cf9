use log::{debug, o, trace, Logger};
use time::OffsetDateTime;

use super::location::{reconcile_location, Owner};
use super::Mode;
use crate::db::DynDb;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::models::{check_length, Event, EventChanges, EventId, Location, User, UserId};
use crate::params::{extract_indexed_objects, is_list_given, list_values, Params};
use crate::parse::{parse_integer, parse_timestamp, parse_wide_integer};
use crate::resolve::{parse_and_resolve_all, resolve_by_id};

/// Creates an event, returning its new ID.
pub async fn create_event<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<EventId, BackendError> {
    let logger = environment.logger.new(o!("operation" => "create_event"));

    reconcile_event(&logger, &*environment.db, params, Mode::Create).await
}

/// Edits the event named by `eid`, returning its ID.
pub async fn edit_event<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<EventId, BackendError> {
    let logger = environment.logger.new(o!("operation" => "edit_event"));

    reconcile_event(&logger, &*environment.db, params, Mode::Edit).await
}

/// An event being assembled from stored state and request data.
#[derive(Debug, Default)]
struct EventDraft {
    eid: Option<EventId>,
    title: Option<String>,
    description: Option<String>,
    date_time: Option<OffsetDateTime>,
    host: Option<UserId>,
}

impl From<Event> for EventDraft {
    fn from(event: Event) -> Self {
        EventDraft {
            eid: Some(event.eid),
            title: Some(event.title),
            description: Some(event.description),
            date_time: Some(event.date_time),
            host: Some(event.host),
        }
    }
}

async fn reconcile_event<P: Params + ?Sized>(
    logger: &Logger,
    db: &DynDb,
    params: &P,
    mode: Mode,
) -> Result<EventId, BackendError> {
    debug!(logger, "Resolving target event..."; "mode" => ?mode);
    let mut draft = match mode {
        Mode::Create => EventDraft::default(),
        Mode::Edit => {
            let eid = params
                .get("eid")
                .and_then(parse_integer)
                .ok_or_else(|| BackendError::validation("missing event ID"))?;

            EventDraft::from(resolve_by_id::<Event>(db, eid, "event").await?)
        }
    };

    let mut raw_participants = list_values(params, "participants[]");
    let mut participants_given = is_list_given(params, "participants[]");

    debug!(logger, "Staging scalar fields...");
    match params.get("title") {
        Some(title) => draft.title = Some(title.to_owned()),
        None if mode.is_create() => draft.title = Some(String::new()),
        None => {}
    }

    match params.get("description") {
        Some(description) => draft.description = Some(description.to_owned()),
        None if mode.is_create() => draft.description = Some(String::new()),
        None => {}
    }

    match params.get("date_time_raw") {
        Some(raw) => draft.date_time = Some(parse_timestamp(raw)?),
        None if mode.is_create() => return Err(BackendError::validation("timestamp is required")),
        None => {}
    }

    match params.get("host") {
        Some(raw) => {
            let uid = parse_wide_integer(raw)
                .ok_or_else(|| BackendError::parse("invalid format for host user ID given"))?;

            db.retrieve_user(uid)
                .await?
                .ok_or_else(|| BackendError::not_found("invalid host user ID given"))?;
            trace!(logger, "Resolved host"; "uid" => uid);

            draft.host = Some(uid);

            if !raw_participants.contains(&raw) {
                raw_participants.push(raw);
            }
            participants_given = true;
        }
        None if mode.is_create() => {
            return Err(BackendError::validation("host user's ID is required"))
        }
        None => {}
    }

    let participants = if participants_given {
        debug!(logger, "Resolving participants..."; "count" => raw_participants.len());
        let users: Vec<User> =
            parse_and_resolve_all(db, &raw_participants, "participant", parse_wide_integer)
                .await?;

        let mut uids: Vec<UserId> = Vec::with_capacity(users.len());
        for user in users {
            trace!(logger, "Resolved participant"; "uid" => user.uid);

            if !uids.contains(&user.uid) {
                uids.push(user.uid);
            }
        }

        Some(uids)
    } else {
        None
    };

    let (raw_locations, locations_given) = extract_indexed_objects(params, "locations");

    let locations = if locations_given {
        debug!(logger, "Reconciling locations..."; "count" => raw_locations.len());
        let owner = Owner(draft.eid);
        let mut locations: Vec<Location> = Vec::with_capacity(raw_locations.len());

        for (index, attrs) in raw_locations.iter().enumerate() {
            let location = reconcile_location(db, attrs, true, true, Some(owner))
                .await
                .map_err(|e| e.with_prefix(format!("invalid location data at index {}: ", index)))?;
            trace!(logger, "Reconciled location"; "index" => index, "id" => ?location.id);

            locations.push(location);
        }

        Some(locations)
    } else {
        None
    };

    debug!(logger, "Validating event...");
    let changes = validate(draft, participants, locations)?;

    debug!(logger, "Saving event...");
    let eid = db.save_event(changes).await?;
    debug!(logger, "Saved event"; "eid" => eid);

    Ok(eid)
}

/// Checks the assembled event and turns it into a complete set of
/// changes. The host always ends up among the participants.
fn validate(
    draft: EventDraft,
    participants: Option<Vec<UserId>>,
    locations: Option<Vec<Location>>,
) -> Result<EventChanges, BackendError> {
    let title = draft.title.unwrap_or_default();
    check_length("title", title.as_str()).map_err(BackendError::Validation)?;

    let date_time = draft
        .date_time
        .ok_or_else(|| BackendError::validation("timestamp is required"))?;
    let host = draft
        .host
        .ok_or_else(|| BackendError::validation("host user's ID is required"))?;

    let participants = participants.map(|mut uids| {
        if !uids.contains(&host) {
            uids.push(host);
        }

        uids
    });

    Ok(EventChanges {
        eid: draft.eid,
        title,
        description: draft.description.unwrap_or_default(),
        date_time,
        host,
        locations,
        participants,
    })
}
