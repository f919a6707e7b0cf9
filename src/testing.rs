//! Fixtures shared by unit tests.

use std::sync::Arc;

use time::OffsetDateTime;
use url::Url;

use crate::db::memory::MemoryDb;
use crate::db::DynDb;
use crate::environment::Environment;
use crate::fetch::mock::MockFetcher;
use crate::models::{EventChanges, EventId, User, UserChanges, UserId};
use crate::params::FormParams;
use crate::store::mock::MockStore;

pub(crate) struct Fixture {
    pub(crate) environment: Environment,
    pub(crate) store: Arc<MockStore>,
}

pub(crate) fn fixture() -> Fixture {
    fixture_with(MockFetcher::new(), false)
}

pub(crate) fn fixture_with(fetcher: MockFetcher, failing_store: bool) -> Fixture {
    let base_url = Url::parse("http://store.test/").expect("parse store URL");
    let store = Arc::new(if failing_store {
        MockStore::failing(base_url)
    } else {
        MockStore::new(base_url)
    });

    let environment = Environment::new(
        Arc::new(log::discarding_logger()),
        Arc::new(MemoryDb::new()),
        store.clone(),
        Arc::new(fetcher),
    );

    Fixture { environment, store }
}

pub(crate) fn params(pairs: &[(&str, &str)]) -> FormParams {
    pairs.iter().copied().collect()
}

pub(crate) fn timestamp(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(seconds)
}

pub(crate) async fn seed_user(db: &DynDb, uid: UserId) {
    db.save_user(UserChanges {
        user: User::new(uid),
        create: true,
        participating: None,
        friends: None,
    })
    .await
    .expect("save user");
}

/// Stores an event with no locations whose only participant is `host`.
pub(crate) async fn seed_event(db: &DynDb, host: UserId) -> EventId {
    db.save_event(EventChanges {
        eid: None,
        title: String::from("Seeded"),
        description: String::new(),
        date_time: timestamp(0),
        host,
        locations: Some(Vec::new()),
        participants: Some(vec![host]),
    })
    .await
    .expect("save event")
}
