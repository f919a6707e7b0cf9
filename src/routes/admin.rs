use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::info;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::rejection::{Context, Rejection};
use super::response::SuccessResponse;
use crate::environment::Environment;

/// Every admin route, with failures rendered as error bodies.
pub fn make_admin<'a>(
    environment: Environment,
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let logger = environment.logger.clone();

    make_healthz_route(environment.clone())
        .or(make_collection_route(environment.clone()))
        .or(make_termination_route(environment, terminate))
        .recover(move |r| super::format_rejection(logger.clone(), r))
}

pub fn make_healthz_route(
    _environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("healthz").and(warp::get()).map(move || {
        json(&SuccessResponse::Healthz {
            revision: info::REVISION,
            timestamp: info::BUILD_TIMESTAMP,
            version: info::VERSION,
        })
    })
}

/// Deletes every location left without an event.
pub fn make_collection_route(
    environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("collect")
        .and(warp::post())
        .and(warp::any().map(move || environment.clone()))
        .and_then(|environment: Environment| async move {
            let removed = environment
                .db
                .collect_orphaned_locations()
                .await
                .map_err(|e| reject::custom(Rejection::new(Context::CollectOrphans, e)))?;

            info!(environment.logger, "Collected orphaned locations"; "removed" => removed);

            Ok::<_, reject::Rejection>(json(&SuccessResponse::Collected { removed }))
        })
}

type TerminationFuture<'a> = BoxFuture<'a, ()>;

pub type TerminationFunctionWrapper<'a> =
    Arc<dyn Fn() -> TerminationFuture<'a> + Send + Sync + 'a>;

pub fn make_termination_route<'a>(
    _environment: Environment,
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let handler = move || -> BoxFuture<'a, Result<StatusCode, std::convert::Infallible>> {
        let terminate = terminate.clone();

        async move {
            let future = terminate();
            future.await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate").and(warp::post()).and_then(handler)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::FutureExt;
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::{make_admin, TerminationFunctionWrapper};
    use crate::db::Db;
    use crate::db::memory::MemoryDb;
    use crate::environment::Environment;
    use crate::models::{EventChanges, Location};
    use crate::testing::{fixture, seed_user, timestamp};

    fn with_db(db: Arc<MemoryDb>) -> Environment {
        Environment {
            db,
            ..fixture().environment
        }
    }

    fn no_termination() -> TerminationFunctionWrapper<'static> {
        Arc::new(|| async {}.boxed())
    }

    async fn request(environment: Environment, method: &str, path: &str) -> (StatusCode, Value) {
        let admin = make_admin(environment, no_termination());

        let response = warp::test::request()
            .method(method)
            .path(path)
            .reply(&admin)
            .await;

        let body = serde_json::from_slice(response.body()).expect("parse response as JSON");

        (response.status(), body)
    }

    #[tokio::test]
    async fn healthz_reports_version() {
        let (status, body) = request(fixture().environment, "GET", "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], json!(info::VERSION));
    }

    #[tokio::test]
    async fn collection_removes_detached_locations() {
        let db = Arc::new(MemoryDb::new());
        seed_user(&*db, 1).await;

        let cafe = Location {
            lat: 1.0,
            lng: 2.0,
            friendly_name: String::from("Cafe"),
            ..Location::default()
        };

        db.save_event(EventChanges {
            eid: None,
            title: String::from("Lunch"),
            description: String::new(),
            date_time: timestamp(0),
            host: 1,
            locations: Some(vec![cafe.clone(), cafe]),
            participants: Some(vec![1]),
        })
        .await
        .expect("save event");
        db.detach_locations();

        let environment = with_db(db);

        assert_eq!(
            request(environment.clone(), "POST", "/collect").await,
            (StatusCode::OK, json!({"removed": 2}))
        );
        assert_eq!(
            request(environment, "POST", "/collect").await,
            (StatusCode::OK, json!({"removed": 0}))
        );
    }

    #[tokio::test]
    async fn collection_failures_are_reported_in_the_body() {
        let environment = with_db(Arc::new(MemoryDb::failing()));

        let (status, body) = request(environment, "POST", "/collect").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"error": "database error"}));
    }
}
