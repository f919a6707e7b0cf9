//! Deletion of events and users.

use log::{debug, o, warn};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::models::{EventId, User, UserId};
use crate::params::Params;
use crate::parse::{parse_integer, parse_wide_integer};
use crate::resolve::resolve_by_id;

/// Deletes an event with its locations and participant links.
pub async fn delete_event<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<EventId, BackendError> {
    let raw = params
        .get("eid")
        .ok_or_else(|| BackendError::validation("missing id argument"))?;
    let eid = parse_integer(raw).ok_or_else(|| BackendError::parse("invalid event"))?;

    debug!(environment.logger, "Deleting event..."; "eid" => eid);

    if !environment.db.delete_event(eid).await? {
        return Err(BackendError::not_found(format!("invalid event ID {}", eid)));
    }

    Ok(eid)
}

/// Deletes a user together with the events they host and their stored
/// profile picture.
pub async fn delete_user<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<UserId, BackendError> {
    let raw = params
        .get("uid")
        .ok_or_else(|| BackendError::validation("missing id argument"))?;
    let uid = parse_wide_integer(raw).ok_or_else(|| BackendError::parse("invalid user"))?;
    let logger = environment.logger.new(o!("uid" => uid));

    let user: User = resolve_by_id(&*environment.db, uid, "user").await?;

    debug!(logger, "Deleting user...");
    if !environment.db.delete_user(uid).await? {
        return Err(BackendError::not_found(format!("invalid user ID {}", uid)));
    }

    if let Some(key) = user.prof_pic {
        debug!(logger, "Deleting profile picture..."; "key" => &key);

        if let Err(e) = environment.store.delete(&key).await {
            warn!(logger, "Failed to delete profile picture"; "key" => &key, "error" => %e);
        }
    }

    Ok(uid)
}

#[cfg(test)]
mod tests {
    use super::{delete_event, delete_user};
    use crate::db::Db;
    use crate::store::Store;
    use crate::testing::{fixture, params, seed_event, seed_user};

    #[tokio::test]
    async fn deletes_events() {
        let fixture = fixture();
        let environment = &fixture.environment;
        seed_user(&*environment.db, 1).await;
        let eid = seed_event(&*environment.db, 1).await;
        let request = params(&[("eid", eid.to_string().as_str())]);

        assert_eq!(delete_event(environment, &request).await.expect("delete event"), eid);

        let error = delete_event(environment, &request).await.expect_err("delete again");
        assert_eq!(error.to_string(), format!("invalid event ID {}", eid));

        let error = delete_event(environment, &params(&[])).await.expect_err("no eid");
        assert_eq!(error.to_string(), "missing id argument");
    }

    #[tokio::test]
    async fn deletes_users_and_their_pictures() {
        let fixture = fixture();
        let environment = &fixture.environment;
        seed_user(&*environment.db, 1).await;
        let eid = seed_event(&*environment.db, 1).await;

        fixture
            .store
            .save("profpic_1.png", String::from("image/png"), vec![0])
            .await
            .expect("save picture");
        environment
            .db
            .set_profile_picture(1, Some(String::from("profpic_1.png")))
            .await
            .expect("set picture");

        assert_eq!(
            delete_user(environment, &params(&[("uid", "1")])).await.expect("delete user"),
            1
        );
        assert!(fixture.store.is_empty());
        assert_eq!(environment.db.retrieve_event(eid).await.expect("retrieve event"), None);

        let error = delete_user(environment, &params(&[("uid", "1")]))
            .await
            .expect_err("delete again");
        assert_eq!(error.to_string(), "invalid user ID 1");

        let error = delete_user(environment, &params(&[("uid", "one")]))
            .await
            .expect_err("bad uid");
        assert_eq!(error.to_string(), "invalid user");
    }
}
