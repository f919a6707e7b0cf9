use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use futures::future::{ready, BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::models::{
    Event, EventChanges, EventId, Location, LocationId, User, UserChanges, UserId,
};

/// A database kept entirely in memory. Every write works on a copy of
/// the tables that replaces the original only if the whole write
/// succeeds.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
    failing: bool,
}

#[derive(Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    events: BTreeMap<EventId, Event>,
    locations: BTreeMap<LocationId, Location>,
    /// (event, participant)
    participants: BTreeSet<(EventId, UserId)>,
    /// (user, friend)
    friends: BTreeSet<(UserId, UserId)>,
    last_event_id: EventId,
    last_location_id: LocationId,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a database that refuses every write as if it were
    /// unreachable.
    pub fn failing() -> Self {
        MemoryDb {
            failing: true,
            ..Self::default()
        }
    }

    /// Detaches every location from its event without sweeping it.
    #[cfg(test)]
    pub(crate) fn detach_locations(&self) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);

        for location in tables.locations.values_mut() {
            location.event_id = None;
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);

        f(&tables)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        if self.failing {
            return Err(BackendError::Sqlx {
                source: sqlx::Error::PoolClosed,
            });
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let mut copy = tables.clone();

        let result = f(&mut copy)?;
        *tables = copy;

        Ok(result)
    }
}

impl Tables {
    fn check_user(&self, uid: UserId) -> Result<(), BackendError> {
        if self.users.contains_key(&uid) {
            Ok(())
        } else {
            Err(BackendError::not_found("referenced record no longer exists"))
        }
    }

    fn check_event(&self, eid: EventId) -> Result<(), BackendError> {
        if self.events.contains_key(&eid) {
            Ok(())
        } else {
            Err(BackendError::not_found("referenced record no longer exists"))
        }
    }

    fn sweep_orphans(&mut self) -> u64 {
        let before = self.locations.len();
        self.locations.retain(|_, l| l.event_id.is_some());

        (before - self.locations.len()) as u64
    }

    fn remove_event(&mut self, eid: EventId) -> bool {
        if self.events.remove(&eid).is_none() {
            return false;
        }

        self.locations.retain(|_, l| l.event_id != Some(eid));
        self.participants.retain(|(e, _)| *e != eid);

        true
    }
}

impl super::Db for MemoryDb {
    fn retrieve_user(&self, uid: UserId) -> BoxFuture<Result<Option<User>, BackendError>> {
        let user = self.read(|t| t.users.get(&uid).cloned());

        ready(Ok(user)).boxed()
    }

    fn retrieve_event(&self, eid: EventId) -> BoxFuture<Result<Option<Event>, BackendError>> {
        let event = self.read(|t| t.events.get(&eid).cloned());

        ready(Ok(event)).boxed()
    }

    fn retrieve_location(
        &self,
        id: LocationId,
    ) -> BoxFuture<Result<Option<Location>, BackendError>> {
        let location = self.read(|t| t.locations.get(&id).cloned());

        ready(Ok(location)).boxed()
    }

    fn friends(&self, uid: UserId) -> BoxFuture<Result<Vec<UserId>, BackendError>> {
        let friends = self.read(|t| {
            t.friends
                .iter()
                .filter(|(u, _)| *u == uid)
                .map(|(_, f)| *f)
                .collect()
        });

        ready(Ok(friends)).boxed()
    }

    fn participating(&self, uid: UserId) -> BoxFuture<Result<Vec<Event>, BackendError>> {
        let events = self.read(|t| {
            t.participants
                .iter()
                .filter(|(_, u)| *u == uid)
                .filter_map(|(e, _)| t.events.get(e).cloned())
                .collect()
        });

        ready(Ok(events)).boxed()
    }

    fn participants(&self, eid: EventId) -> BoxFuture<Result<Vec<User>, BackendError>> {
        let mut users: Vec<User> = self.read(|t| {
            t.participants
                .iter()
                .filter(|(e, _)| *e == eid)
                .filter_map(|(_, u)| t.users.get(u).cloned())
                .collect()
        });
        users.sort_by_key(|u| u.uid);

        ready(Ok(users)).boxed()
    }

    fn locations(&self, eid: EventId) -> BoxFuture<Result<Vec<Location>, BackendError>> {
        let locations = self.read(|t| {
            t.locations
                .values()
                .filter(|l| l.event_id == Some(eid))
                .cloned()
                .collect()
        });

        ready(Ok(locations)).boxed()
    }

    fn save_event(&self, changes: EventChanges) -> BoxFuture<Result<EventId, BackendError>> {
        let result = self.write(|t| {
            t.check_user(changes.host)?;

            let eid = match changes.eid {
                Some(eid) => {
                    t.check_event(eid)?;
                    eid
                }
                None => {
                    t.last_event_id += 1;
                    t.last_event_id
                }
            };

            t.events.insert(
                eid,
                Event {
                    eid,
                    title: changes.title,
                    description: changes.description,
                    date_time: changes.date_time,
                    host: changes.host,
                },
            );

            if let Some(locations) = changes.locations {
                for location in t.locations.values_mut() {
                    if location.event_id == Some(eid) {
                        location.event_id = None;
                    }
                }

                for location in locations {
                    let id = match location.id {
                        Some(id) => id,
                        None => {
                            t.last_location_id += 1;
                            t.last_location_id
                        }
                    };

                    t.locations.insert(
                        id,
                        Location {
                            id: Some(id),
                            event_id: Some(eid),
                            ..location
                        },
                    );
                }

                t.sweep_orphans();
            }

            if let Some(participants) = changes.participants {
                t.participants.retain(|(e, _)| *e != eid);

                for uid in participants {
                    t.check_user(uid)?;
                    t.participants.insert((eid, uid));
                }
            }

            Ok(eid)
        });

        ready(result).boxed()
    }

    fn save_user(&self, changes: UserChanges) -> BoxFuture<Result<(), BackendError>> {
        let result = self.write(|t| {
            let uid = changes.user.uid;

            match (changes.create, t.users.contains_key(&uid)) {
                (true, true) => {
                    return Err(BackendError::conflict(format!(
                        "cannot create user {}, already exists",
                        uid
                    )))
                }
                (false, false) => {
                    return Err(BackendError::conflict(format!(
                        "cannot edit user {}, does not exist",
                        uid
                    )))
                }
                _ => {}
            }

            t.users.insert(uid, changes.user);

            if let Some(participating) = changes.participating {
                t.participants.retain(|(_, u)| *u != uid);

                for eid in participating {
                    t.check_event(eid)?;
                    t.participants.insert((eid, uid));
                }
            }

            if let Some(friends) = changes.friends {
                t.friends.retain(|(u, _)| *u != uid);

                for friend in friends {
                    t.check_user(friend)?;
                    t.friends.insert((uid, friend));
                }
            }

            Ok(())
        });

        ready(result).boxed()
    }

    fn set_profile_picture(
        &self,
        uid: UserId,
        key: Option<String>,
    ) -> BoxFuture<Result<(), BackendError>> {
        let result = self.write(|t| {
            if let Some(user) = t.users.get_mut(&uid) {
                user.prof_pic = key;
            }

            Ok(())
        });

        ready(result).boxed()
    }

    fn delete_event(&self, eid: EventId) -> BoxFuture<Result<bool, BackendError>> {
        let result = self.write(|t| Ok(t.remove_event(eid)));

        ready(result).boxed()
    }

    fn delete_user(&self, uid: UserId) -> BoxFuture<Result<bool, BackendError>> {
        let result = self.write(|t| {
            if t.users.remove(&uid).is_none() {
                return Ok(false);
            }

            let hosted = t
                .events
                .values()
                .filter(|e| e.host == uid)
                .map(|e| e.eid)
                .collect::<Vec<_>>();

            for eid in hosted {
                t.remove_event(eid);
            }

            t.participants.retain(|(_, u)| *u != uid);
            t.friends.retain(|(u, f)| *u != uid && *f != uid);

            Ok(true)
        });

        ready(result).boxed()
    }

    fn collect_orphaned_locations(&self) -> BoxFuture<Result<u64, BackendError>> {
        let result = self.write(|t| Ok(t.sweep_orphans()));

        ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDb;
    use crate::db::Db;
    use crate::models::{EventChanges, Location};
    use crate::testing::{seed_user, timestamp};

    fn location(name: &str) -> Location {
        Location {
            lat: 1.0,
            lng: 2.0,
            friendly_name: name.to_owned(),
            ..Location::default()
        }
    }

    fn lunch(host: i64, participants: Vec<i64>) -> EventChanges {
        EventChanges {
            eid: None,
            title: String::from("Lunch"),
            description: String::new(),
            date_time: timestamp(0),
            host,
            locations: Some(vec![location("Cafe")]),
            participants: Some(participants),
        }
    }

    #[tokio::test]
    async fn failed_saves_change_nothing() {
        let db = MemoryDb::new();
        seed_user(&db, 1).await;

        db.save_event(lunch(1, vec![1, 99]))
            .await
            .expect_err("save with missing participant");

        assert_eq!(db.retrieve_event(1).await.expect("retrieve event"), None);
        assert_eq!(db.retrieve_location(1).await.expect("retrieve location"), None);
    }

    #[tokio::test]
    async fn deleting_a_host_deletes_their_events() {
        let db = MemoryDb::new();
        seed_user(&db, 1).await;
        seed_user(&db, 2).await;

        let eid = db.save_event(lunch(1, vec![1, 2])).await.expect("save event");

        assert!(db.delete_user(1).await.expect("delete user"));
        assert_eq!(db.retrieve_event(eid).await.expect("retrieve event"), None);
        assert!(db.locations(eid).await.expect("retrieve locations").is_empty());
        assert!(db.participating(2).await.expect("retrieve events").is_empty());
        assert!(!db.delete_user(1).await.expect("delete user again"));
    }

    #[tokio::test]
    async fn orphans_are_collected_once() {
        let db = MemoryDb::new();
        seed_user(&db, 1).await;

        let eid = db.save_event(lunch(1, vec![1])).await.expect("save event");
        db.detach_locations();

        assert!(db.locations(eid).await.expect("retrieve locations").is_empty());
        assert_eq!(db.collect_orphaned_locations().await.expect("collect orphans"), 1);
        assert_eq!(db.collect_orphaned_locations().await.expect("collect orphans"), 0);
    }

    #[tokio::test]
    async fn failing_databases_refuse_writes() {
        let db = MemoryDb::failing();

        assert_eq!(
            format!("{}", db.delete_user(1).await.expect_err("delete user")),
            "database error"
        );
        assert_eq!(db.retrieve_user(1).await.expect("retrieve user"), None);
    }
}
