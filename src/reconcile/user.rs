use log::{debug, o, trace, warn, Logger};

use super::Mode;
use crate::environment::Environment;
use crate::errors::{BackendError, Failure};
use crate::fetch::Image;
use crate::models::{check_length, Event, User, UserChanges, UserId};
use crate::params::{is_list_given, list_values, Params};
use crate::parse::{parse_integer, parse_wide_integer};
use crate::resolve::parse_and_resolve_all;

/// Creates a user. A failure after the row was written removes the row
/// again before reporting the error.
pub async fn create_user<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<UserId, Failure> {
    let logger = environment.logger.new(o!("operation" => "create_user"));

    match reconcile_user(&logger, environment, params, Mode::Create).await {
        Ok(uid) => Ok(uid),
        Err(Failure {
            error,
            uid: Some(uid),
        }) => {
            debug!(logger, "Removing partially created user..."; "uid" => uid);

            if let Err(e) = environment.db.delete_user(uid).await {
                warn!(logger, "Failed to remove partially created user"; "uid" => uid, "error" => %e);
            }

            Err(Failure::from(error))
        }
        Err(failure) => Err(failure),
    }
}

/// Edits an existing user. A failure after the row was written carries
/// the user's ID.
pub async fn edit_user<P: Params + ?Sized>(
    environment: &Environment,
    params: &P,
) -> Result<UserId, Failure> {
    let logger = environment.logger.new(o!("operation" => "edit_user"));

    reconcile_user(&logger, environment, params, Mode::Edit).await
}

/// What to do with the profile picture.
enum PictureChange {
    Keep,
    Clear,
    Replace(Image),
}

async fn reconcile_user<P: Params + ?Sized>(
    logger: &Logger,
    environment: &Environment,
    params: &P,
    mode: Mode,
) -> Result<UserId, Failure> {
    let db = &*environment.db;

    debug!(logger, "Resolving target user..."; "mode" => ?mode);
    let raw_uid = params
        .get("uid")
        .ok_or_else(|| BackendError::validation("facebook uid is required"))?;
    let uid = parse_wide_integer(raw_uid)
        .filter(|uid| *uid >= 0)
        .ok_or_else(|| BackendError::parse("invalid uid given; incorrect format"))?;

    let existing = db.retrieve_user(uid).await?;

    let mut user = match (mode, existing) {
        (Mode::Create, Some(_)) => {
            return Err(BackendError::conflict(format!(
                "cannot create user {}, already exists",
                uid
            ))
            .into())
        }
        (Mode::Edit, None) => {
            return Err(BackendError::conflict(format!(
                "cannot edit user {}, does not exist",
                uid
            ))
            .into())
        }
        (_, Some(user)) => user,
        (_, None) => User::new(uid),
    };
    let old_picture = user.prof_pic.clone();

    debug!(logger, "Staging fields...");
    if let Some(first_name) = params.get("first_name") {
        user.first_name = first_name.to_owned();
    }

    if let Some(last_name) = params.get("last_name") {
        user.last_name = last_name.to_owned();
    }

    let participating = if is_list_given(params, "participating[]") {
        let raw = list_values(params, "participating[]");
        debug!(logger, "Resolving participating events..."; "count" => raw.len());

        let events: Vec<Event> =
            parse_and_resolve_all(db, &raw, "participating", parse_integer).await?;

        for event in &events {
            trace!(logger, "Resolved participating event"; "eid" => event.eid);
        }

        Some(unique(events.iter().map(|event| event.eid)))
    } else {
        None
    };

    let friends = if is_list_given(params, "friends[]") {
        let raw = list_values(params, "friends[]");
        debug!(logger, "Resolving friends..."; "count" => raw.len());

        let users: Vec<User> = parse_and_resolve_all(db, &raw, "friend", parse_wide_integer).await?;

        for friend in &users {
            trace!(logger, "Resolved friend"; "uid" => friend.uid);
        }

        Some(unique(users.iter().map(|user| user.uid)))
    } else {
        None
    };

    let picture = match params.get("prof_pic") {
        None => PictureChange::Keep,
        Some("") => {
            user.prof_pic = None;
            PictureChange::Clear
        }
        Some(url) => {
            debug!(logger, "Fetching profile picture..."; "url" => url);
            PictureChange::Replace(environment.fetcher.fetch(url).await?)
        }
    };

    debug!(logger, "Validating user...");
    check_length("first_name", &user.first_name).map_err(BackendError::Validation)?;
    check_length("last_name", &user.last_name).map_err(BackendError::Validation)?;

    debug!(logger, "Saving user...");
    db.save_user(UserChanges {
        user,
        create: mode.is_create(),
        participating,
        friends,
    })
    .await?;

    match picture {
        PictureChange::Keep => {}
        PictureChange::Clear => {
            if let Some(key) = old_picture {
                discard_picture(logger, environment, &key).await;
            }
        }
        PictureChange::Replace(image) => {
            let key = format!("profpic_{}.{}", uid, image.extension);
            debug!(logger, "Saving profile picture..."; "key" => &key);

            environment
                .store
                .save(&key, image.content_type, image.bytes)
                .await
                .map_err(|e| Failure::with_uid(e, uid))?;

            db.set_profile_picture(uid, Some(key.clone()))
                .await
                .map_err(|e| Failure::with_uid(e, uid))?;

            if let Some(old) = old_picture.filter(|old| *old != key) {
                discard_picture(logger, environment, &old).await;
            }
        }
    }

    debug!(logger, "Saved user"; "uid" => uid);

    Ok(uid)
}

/// Removes a stored picture that is no longer referenced, logging
/// rather than failing if the store refuses.
async fn discard_picture(logger: &Logger, environment: &Environment, key: &str) {
    if let Err(e) = environment.store.delete(key).await {
        warn!(logger, "Failed to delete old profile picture"; "key" => key, "error" => %e);
    }
}

/// Collects IDs in order, dropping repeats.
fn unique<T: PartialEq>(ids: impl Iterator<Item = T>) -> Vec<T> {
    let mut output = Vec::new();

    for id in ids {
        if !output.contains(&id) {
            output.push(id);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::{create_user, edit_user};
    use crate::db::Db;
    use crate::errors::BackendError;
    use crate::fetch::mock::MockFetcher;
    use crate::testing::{fixture, fixture_with, params, seed_event, seed_user};

    const PICTURE_URL: &str = "http://pictures.test/me.png";

    fn picture_fetcher() -> MockFetcher {
        MockFetcher::new().with_image(PICTURE_URL, "image/png", "png", vec![1, 2, 3])
    }

    #[tokio::test]
    async fn creates_users() {
        let fixture = fixture();
        seed_user(&*fixture.environment.db, 2).await;

        let uid = create_user(
            &fixture.environment,
            &params(&[
                ("uid", "1"),
                ("first_name", "Ada"),
                ("last_name", "Lovelace"),
                ("friends[]", "2"),
            ]),
        )
        .await
        .expect("create user");

        let db = &fixture.environment.db;
        let user = db.retrieve_user(uid).await.expect("retrieve user").expect("user exists");
        assert_eq!((user.first_name.as_str(), user.last_name.as_str()), ("Ada", "Lovelace"));
        assert_eq!(user.prof_pic, None);
        assert_eq!(db.friends(uid).await.expect("retrieve friends"), vec![2]);
    }

    #[tokio::test]
    async fn uid_is_checked_first() {
        let fixture = fixture();

        let cases = vec![
            (params(&[("first_name", "x")]), "facebook uid is required"),
            (params(&[("uid", "abc")]), "invalid uid given; incorrect format"),
            (params(&[("uid", "-4")]), "invalid uid given; incorrect format"),
        ];

        for (request, expected) in cases {
            let error = create_user(&fixture.environment, &request)
                .await
                .expect_err("create invalid user");

            assert_eq!(error.error.to_string(), expected);
            assert_eq!(error.uid, None);
        }
    }

    #[tokio::test]
    async fn duplicate_creation_conflicts() {
        let fixture = fixture();
        seed_user(&*fixture.environment.db, 5).await;

        let failure = create_user(
            &fixture.environment,
            &params(&[("uid", "5"), ("first_name", "Changed")]),
        )
        .await
        .expect_err("create existing user");

        match failure.error {
            BackendError::Conflict(message) => {
                assert_eq!(message, "cannot create user 5, already exists")
            }
            other => panic!("unexpected error {:?}", other),
        }

        let user = fixture
            .environment
            .db
            .retrieve_user(5)
            .await
            .expect("retrieve user")
            .expect("user exists");
        assert_eq!(user.first_name, "");
    }

    #[tokio::test]
    async fn editing_requires_existing_user() {
        let fixture = fixture();

        let failure = edit_user(&fixture.environment, &params(&[("uid", "5")]))
            .await
            .expect_err("edit missing user");

        assert_eq!(failure.error.to_string(), "cannot edit user 5, does not exist");
    }

    #[tokio::test]
    async fn edits_replace_given_lists_only() {
        let fixture = fixture();
        let db = &fixture.environment.db;

        for uid in &[1, 2, 3] {
            seed_user(&**db, *uid).await;
        }
        let eid = seed_event(&**db, 2).await;

        edit_user(
            &fixture.environment,
            &params(&[
                ("uid", "1"),
                ("friends[]", "2"),
                ("friends[]", "3"),
                ("friends[]", "2"),
                ("participating[]", eid.to_string().as_str()),
            ]),
        )
        .await
        .expect("edit user");

        assert_eq!(db.friends(1).await.expect("retrieve friends"), vec![2, 3]);
        assert_eq!(db.participating(1).await.expect("retrieve events").len(), 1);

        edit_user(
            &fixture.environment,
            &params(&[("uid", "1"), ("last_name", "Byron"), ("friends", "")]),
        )
        .await
        .expect("edit user");

        let user = db.retrieve_user(1).await.expect("retrieve user").expect("user exists");
        assert_eq!(user.last_name, "Byron");
        assert!(db.friends(1).await.expect("retrieve friends").is_empty());
        assert_eq!(db.participating(1).await.expect("retrieve events").len(), 1);
    }

    #[tokio::test]
    async fn bad_list_entries_fail() {
        let fixture = fixture();
        seed_user(&*fixture.environment.db, 1).await;

        let failure = edit_user(
            &fixture.environment,
            &params(&[("uid", "1"), ("participating[]", "2.5")]),
        )
        .await
        .expect_err("edit with malformed event ID");
        assert_eq!(failure.error.to_string(), "unable to parse participating ID 2.5");

        let failure = edit_user(&fixture.environment, &params(&[("uid", "1"), ("friends[]", "44")]))
            .await
            .expect_err("edit with missing friend");
        assert_eq!(failure.error.to_string(), "invalid friend ID 44");
    }

    #[tokio::test]
    async fn stores_profile_pictures() {
        let fixture = fixture_with(picture_fetcher(), false);

        create_user(&fixture.environment, &params(&[("uid", "9"), ("prof_pic", PICTURE_URL)]))
            .await
            .expect("create user");

        let user = fixture
            .environment
            .db
            .retrieve_user(9)
            .await
            .expect("retrieve user")
            .expect("user exists");

        assert_eq!(user.prof_pic.as_deref(), Some("profpic_9.png"));
        assert_eq!(
            fixture.store.get("profpic_9.png"),
            Some((String::from("image/png"), vec![1, 2, 3]))
        );

        edit_user(&fixture.environment, &params(&[("uid", "9"), ("prof_pic", "")]))
            .await
            .expect("clear picture");

        let user = fixture
            .environment
            .db
            .retrieve_user(9)
            .await
            .expect("retrieve user")
            .expect("user exists");

        assert_eq!(user.prof_pic, None);
        assert!(fixture.store.is_empty());
    }

    #[tokio::test]
    async fn fetch_failures_write_nothing() {
        let fixture = fixture();

        let failure = create_user(
            &fixture.environment,
            &params(&[("uid", "9"), ("prof_pic", "http://nowhere.test/x.png")]),
        )
        .await
        .expect_err("create with unreachable picture");

        assert_eq!(
            failure.error.to_string(),
            "unable to retrieve image from http://nowhere.test/x.png"
        );
        assert_eq!(
            fixture.environment.db.retrieve_user(9).await.expect("retrieve user"),
            None
        );
    }

    #[tokio::test]
    async fn storage_failures_remove_created_users() {
        let fixture = fixture_with(picture_fetcher(), true);

        let failure = create_user(&fixture.environment, &params(&[("uid", "9"), ("prof_pic", PICTURE_URL)]))
            .await
            .expect_err("create with failing store");

        assert_eq!(failure.error.to_string(), "unable to store profpic_9.png");
        assert_eq!(failure.uid, None);
        assert_eq!(
            fixture.environment.db.retrieve_user(9).await.expect("retrieve user"),
            None
        );
    }

    #[tokio::test]
    async fn storage_failures_on_edit_carry_the_uid() {
        let fixture = fixture_with(picture_fetcher(), true);
        seed_user(&*fixture.environment.db, 9).await;

        let failure = edit_user(&fixture.environment, &params(&[("uid", "9"), ("prof_pic", PICTURE_URL)]))
            .await
            .expect_err("edit with failing store");

        assert_eq!(failure.uid, Some(9));
        assert!(fixture
            .environment
            .db
            .retrieve_user(9)
            .await
            .expect("retrieve user")
            .is_some());
    }
}
