use crate::db::DynDb;
use crate::errors::BackendError;
use crate::models::{check_length, EventId, Location};
use crate::params::Params;
use crate::parse::{parse_float, parse_integer};

/// The event a location is reconciled under, holding `None` while that
/// event has not been saved yet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Owner(pub(crate) Option<EventId>);

impl Owner {
    fn owns(self, location: &Location) -> bool {
        self.0.is_some() && location.event_id == self.0
    }
}

/// Builds one location from its attributes, editing the stored location
/// named by `id` if there is one. The result is validated but not saved,
/// and is not yet attached to any event.
pub(crate) async fn reconcile_location<P: Params + ?Sized>(
    db: &DynDb,
    attrs: &P,
    allow_creation: bool,
    allow_editing: bool,
    owner: Option<Owner>,
) -> Result<Location, BackendError> {
    let num_votes = match attrs.get("num_votes") {
        Some(raw) => parse_integer(raw)
            .filter(|votes| *votes >= 0)
            .ok_or_else(|| BackendError::validation("invalid number of votes given"))?,
        None => 0,
    };

    let existing = match attrs.get("id").and_then(parse_integer) {
        Some(id) => db.retrieve_location(id).await?.map(|location| (id, location)),
        None => None,
    };

    let mut location = match existing {
        Some((id, _)) if !allow_editing => {
            return Err(BackendError::conflict(format!(
                "location ID {} already exists",
                id
            )))
        }
        Some((id, location)) => match owner {
            Some(owner) if !owner.owns(&location) => {
                return Err(BackendError::permission(format!(
                    "not allowed to modify location ID {}",
                    id
                )))
            }
            _ => location,
        },
        None if allow_creation => Location::default(),
        None => {
            return Err(BackendError::permission(
                "location id not given, new location creation not allowed",
            ))
        }
    };

    location.lat = coordinate(attrs, "lat", 90.0)?;
    location.lng = coordinate(attrs, "lng", 180.0)?;
    location.friendly_name = attrs.get("friendly_name").unwrap_or_default().to_owned();
    location.link = attrs.get("link").unwrap_or_default().to_owned();
    location.num_votes = num_votes;

    check_length("friendly_name", &location.friendly_name).map_err(BackendError::Validation)?;
    check_length("link", &location.link).map_err(BackendError::Validation)?;

    Ok(location)
}

/// Reads a required coordinate lying within `[-limit, limit]`.
fn coordinate<P: Params + ?Sized>(attrs: &P, name: &str, limit: f64) -> Result<f64, BackendError> {
    let raw = attrs
        .get(name)
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| BackendError::validation(format!("{} is required", name)))?;

    let value = parse_float(raw)
        .filter(|value| value.is_finite())
        .ok_or_else(|| BackendError::validation(format!("{} must be a finite number", name)))?;

    if value.abs() > limit {
        return Err(BackendError::validation(format!(
            "{} must be between -{} and {}",
            name, limit, limit
        )));
    }

    Ok(value)
}
