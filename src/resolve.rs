//! Turns raw identifiers into persisted entities.

use std::fmt::Display;

use futures::future::BoxFuture;

use crate::db::DynDb;
use crate::errors::BackendError;
use crate::models::{Event, EventId, User, UserId};

/// An entity that can be looked up by primary key.
pub trait Entity: Sized + Send {
    type Id: Copy + Display + Send + Sync;

    fn retrieve(db: &DynDb, id: Self::Id) -> BoxFuture<'_, Result<Option<Self>, BackendError>>;
}

impl Entity for User {
    type Id = UserId;

    fn retrieve(db: &DynDb, id: UserId) -> BoxFuture<'_, Result<Option<Self>, BackendError>> {
        db.retrieve_user(id)
    }
}

impl Entity for Event {
    type Id = EventId;

    fn retrieve(db: &DynDb, id: EventId) -> BoxFuture<'_, Result<Option<Self>, BackendError>> {
        db.retrieve_event(id)
    }
}

/// Looks up a single entity, failing if it does not exist. `name`
/// describes the entity in the error message.
pub async fn resolve_by_id<E: Entity>(
    db: &DynDb,
    id: E::Id,
    name: &str,
) -> Result<E, BackendError> {
    E::retrieve(db, id)
        .await?
        .ok_or_else(|| BackendError::not_found(format!("invalid {} ID {}", name, id)))
}

/// Looks up every ID in order, stopping at the first failure.
pub async fn resolve_all<E: Entity>(
    db: &DynDb,
    ids: &[E::Id],
    name: &str,
) -> Result<Vec<E>, BackendError> {
    let mut entities = Vec::with_capacity(ids.len());

    for id in ids {
        entities.push(resolve_by_id(db, *id, name).await?);
    }

    Ok(entities)
}

/// Parses every token, then resolves them. Nothing is looked up unless
/// every token parses.
pub async fn parse_and_resolve_all<E, T, F>(
    db: &DynDb,
    tokens: &[T],
    name: &str,
    parse: F,
) -> Result<Vec<E>, BackendError>
where
    E: Entity,
    T: AsRef<str>,
    F: Fn(&str) -> Option<E::Id>,
{
    let ids = tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();

            parse(token)
                .ok_or_else(|| BackendError::parse(format!("unable to parse {} ID {}", name, token)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    resolve_all(db, &ids, name).await
}
