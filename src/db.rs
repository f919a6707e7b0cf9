use futures::future::BoxFuture;

use crate::errors::BackendError;
use crate::models::{
    Event, EventChanges, EventId, Location, LocationId, User, UserChanges, UserId,
};

pub mod memory;

/// The database as shared between routes.
pub type DynDb = dyn Db + Send + Sync;

pub trait Db {
    fn retrieve_user(&self, uid: UserId) -> BoxFuture<Result<Option<User>, BackendError>>;

    fn retrieve_event(&self, eid: EventId) -> BoxFuture<Result<Option<Event>, BackendError>>;

    fn retrieve_location(
        &self,
        id: LocationId,
    ) -> BoxFuture<Result<Option<Location>, BackendError>>;

    /// The users this user lists as friends, by ID.
    fn friends(&self, uid: UserId) -> BoxFuture<Result<Vec<UserId>, BackendError>>;

    /// The events this user participates in.
    fn participating(&self, uid: UserId) -> BoxFuture<Result<Vec<Event>, BackendError>>;

    fn participants(&self, eid: EventId) -> BoxFuture<Result<Vec<User>, BackendError>>;

    fn locations(&self, eid: EventId) -> BoxFuture<Result<Vec<Location>, BackendError>>;

    /// Writes an event, and replaces whichever of its location and
    /// participant sets are given, as one atomic unit. Replacing the
    /// locations also deletes every orphaned location.
    fn save_event(&self, changes: EventChanges) -> BoxFuture<Result<EventId, BackendError>>;

    /// Writes a user, and replaces whichever of its participation and
    /// friend sets are given, as one atomic unit.
    fn save_user(&self, changes: UserChanges) -> BoxFuture<Result<(), BackendError>>;

    fn set_profile_picture(
        &self,
        uid: UserId,
        key: Option<String>,
    ) -> BoxFuture<Result<(), BackendError>>;

    /// Deletes an event along with its locations. Returns whether it existed.
    fn delete_event(&self, eid: EventId) -> BoxFuture<Result<bool, BackendError>>;

    /// Deletes a user along with the events they host. Returns whether
    /// they existed.
    fn delete_user(&self, uid: UserId) -> BoxFuture<Result<bool, BackendError>>;

    /// Deletes every location without an owning event, returning how many
    /// were removed.
    fn collect_orphaned_locations(&self) -> BoxFuture<Result<u64, BackendError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::OffsetDateTime;

    use crate::errors::BackendError;
    use crate::models::{
        Event, EventChanges, EventId, Location, LocationId, User, UserChanges, UserId,
    };

    const USERS_PRIMARY_KEY_CONSTRAINT: &str = "users_pkey";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn retrieve_user(&self, uid: UserId) -> BoxFuture<Result<Option<User>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_user.sql"));

                let user = query
                    .bind(uid)
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(user)
            }
            .boxed()
        }

        fn retrieve_event(&self, eid: EventId) -> BoxFuture<Result<Option<Event>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_event.sql"));

                let event = query
                    .bind(eid)
                    .try_map(|row: PgRow| event_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(event)
            }
            .boxed()
        }

        fn retrieve_location(
            &self,
            id: LocationId,
        ) -> BoxFuture<Result<Option<Location>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_location.sql"));

                let location = query
                    .bind(id)
                    .try_map(|row: PgRow| location_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(location)
            }
            .boxed()
        }

        fn friends(&self, uid: UserId) -> BoxFuture<Result<Vec<UserId>, BackendError>> {
            async move {
                let query = sqlx::query_as::<_, (UserId,)>(include_str!(
                    "queries/retrieve_friends.sql"
                ));

                let friends = query
                    .bind(uid)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(friends.into_iter().map(|(uid,)| uid).collect())
            }
            .boxed()
        }

        fn participating(&self, uid: UserId) -> BoxFuture<Result<Vec<Event>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_participating.sql"));

                let events = query
                    .bind(uid)
                    .try_map(|row: PgRow| event_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(events)
            }
            .boxed()
        }

        fn participants(&self, eid: EventId) -> BoxFuture<Result<Vec<User>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_participants.sql"));

                let users = query
                    .bind(eid)
                    .try_map(|row: PgRow| user_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(users)
            }
            .boxed()
        }

        fn locations(&self, eid: EventId) -> BoxFuture<Result<Vec<Location>, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/retrieve_locations.sql"));

                let locations = query
                    .bind(eid)
                    .try_map(|row: PgRow| location_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(locations)
            }
            .boxed()
        }

        fn save_event(&self, changes: EventChanges) -> BoxFuture<Result<EventId, BackendError>> {
            async move {
                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let eid = match changes.eid {
                    Some(eid) => {
                        sqlx::query(include_str!("queries/update_event.sql"))
                            .bind(eid)
                            .bind(&changes.title)
                            .bind(&changes.description)
                            .bind(changes.date_time)
                            .bind(changes.host)
                            .execute(&mut tx)
                            .await
                            .map_err(map_sqlx_error)?;

                        eid
                    }
                    None => {
                        let (eid,): (EventId,) =
                            sqlx::query_as(include_str!("queries/create_event.sql"))
                                .bind(&changes.title)
                                .bind(&changes.description)
                                .bind(changes.date_time)
                                .bind(changes.host)
                                .fetch_one(&mut tx)
                                .await
                                .map_err(map_sqlx_error)?;

                        eid
                    }
                };

                if let Some(locations) = &changes.locations {
                    sqlx::query(include_str!("queries/detach_locations.sql"))
                        .bind(eid)
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    for location in locations {
                        let query = match location.id {
                            Some(id) => sqlx::query(include_str!("queries/update_location.sql"))
                                .bind(id),
                            None => sqlx::query(include_str!("queries/create_location.sql")),
                        };

                        query
                            .bind(location.lat)
                            .bind(location.lng)
                            .bind(&location.friendly_name)
                            .bind(&location.link)
                            .bind(location.num_votes)
                            .bind(eid)
                            .execute(&mut tx)
                            .await
                            .map_err(map_sqlx_error)?;
                    }

                    sqlx::query(include_str!("queries/delete_orphaned_locations.sql"))
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }

                if let Some(participants) = &changes.participants {
                    sqlx::query(include_str!("queries/clear_participants.sql"))
                        .bind(eid)
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    for uid in participants {
                        sqlx::query(include_str!("queries/add_participant.sql"))
                            .bind(eid)
                            .bind(*uid)
                            .execute(&mut tx)
                            .await
                            .map_err(map_sqlx_error)?;
                    }
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(eid)
            }
            .boxed()
        }

        fn save_user(&self, changes: UserChanges) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let UserChanges {
                    user,
                    create,
                    participating,
                    friends,
                } = changes;

                let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

                let query = if create {
                    sqlx::query(include_str!("queries/create_user.sql"))
                } else {
                    sqlx::query(include_str!("queries/update_user.sql"))
                };

                query
                    .bind(user.uid)
                    .bind(&user.first_name)
                    .bind(&user.last_name)
                    .bind(&user.prof_pic)
                    .execute(&mut tx)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(ref d)
                            if d.constraint() == Some(USERS_PRIMARY_KEY_CONSTRAINT) =>
                        {
                            BackendError::conflict(format!(
                                "cannot create user {}, already exists",
                                user.uid
                            ))
                        }
                        e => map_sqlx_error(e),
                    })?;

                if let Some(participating) = &participating {
                    sqlx::query(include_str!("queries/clear_participating.sql"))
                        .bind(user.uid)
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    for eid in participating {
                        sqlx::query(include_str!("queries/add_participant.sql"))
                            .bind(*eid)
                            .bind(user.uid)
                            .execute(&mut tx)
                            .await
                            .map_err(map_sqlx_error)?;
                    }
                }

                if let Some(friends) = &friends {
                    sqlx::query(include_str!("queries/clear_friends.sql"))
                        .bind(user.uid)
                        .execute(&mut tx)
                        .await
                        .map_err(map_sqlx_error)?;

                    for friend in friends {
                        sqlx::query(include_str!("queries/add_friend.sql"))
                            .bind(user.uid)
                            .bind(*friend)
                            .execute(&mut tx)
                            .await
                            .map_err(map_sqlx_error)?;
                    }
                }

                tx.commit().await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn set_profile_picture(
            &self,
            uid: UserId,
            key: Option<String>,
        ) -> BoxFuture<Result<(), BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/update_profile_picture.sql"));

                query
                    .bind(uid)
                    .bind(key)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn delete_event(&self, eid: EventId) -> BoxFuture<Result<bool, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/delete_event.sql"));

                let count = query
                    .bind(eid)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn delete_user(&self, uid: UserId) -> BoxFuture<Result<bool, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/delete_user.sql"));

                let count = query
                    .bind(uid)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count > 0)
            }
            .boxed()
        }

        fn collect_orphaned_locations(&self) -> BoxFuture<Result<u64, BackendError>> {
            async move {
                let query = sqlx::query(include_str!("queries/delete_orphaned_locations.sql"));

                let count = query
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                Ok(count)
            }
            .boxed()
        }
    }

    fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
        Ok(User {
            uid: try_get(row, "uid")?,
            first_name: try_get(row, "first_name")?,
            last_name: try_get(row, "last_name")?,
            prof_pic: try_get(row, "prof_pic")?,
        })
    }

    fn event_from_row(row: &PgRow) -> Result<Event, sqlx::Error> {
        let date_time: OffsetDateTime = try_get(row, "date_time")?;

        Ok(Event {
            eid: try_get(row, "eid")?,
            title: try_get(row, "title")?,
            description: try_get(row, "description")?,
            date_time,
            host: try_get(row, "host")?,
        })
    }

    fn location_from_row(row: &PgRow) -> Result<Location, sqlx::Error> {
        let id: LocationId = try_get(row, "id")?;

        Ok(Location {
            id: Some(id),
            lat: try_get(row, "lat")?,
            lng: try_get(row, "lng")?,
            friendly_name: try_get(row, "friendly_name")?,
            link: try_get(row, "link")?,
            num_votes: try_get(row, "num_votes")?,
            event_id: try_get(row, "event_id")?,
        })
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> BackendError {
        use sqlx::Error;

        match error {
            // a referenced row vanished between lookup and commit
            Error::Database(ref e) if e.code().as_deref() == Some("23503") => {
                BackendError::not_found("referenced record no longer exists")
            }
            _ => BackendError::Sqlx { source: error },
        }
    }
}
