use std::sync::Arc;
use std::time::Instant;

use log::{error, Logger};
use warp::reject;
use warp::reply::{json, with_header, Json, Reply, WithHeader};
use warp::Filter;

use crate::environment::Environment;
use crate::params::FormParams;

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

/// The maximum urlencoded body size to accept.
const MAX_FORM_LENGTH: u64 = 1024 * 1024;

/// Every public route, with failures rendered as error bodies.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_get_user_route(environment.clone())
        .or(make_get_event_route(environment.clone()))
        .unify()
        .or(make_get_user_events_route(environment.clone()))
        .unify()
        .or(make_create_event_route(environment.clone()))
        .unify()
        .or(make_edit_event_route(environment.clone()))
        .unify()
        .or(make_create_user_route(environment.clone()))
        .unify()
        .or(make_edit_user_route(environment.clone()))
        .unify()
        .or(make_delete_event_route(environment.clone()))
        .unify()
        .or(make_delete_user_route(environment))
        .unify()
        .recover(move |r| format_rejection(logger.clone(), r))
}

/// Turns failed operations into `200 OK` responses carrying an `error`
/// message. Everything else is left to warp.
pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithHeader<Json>, reject::Rejection> {
    let start = Instant::now();

    let reply = if let Some(r) = rej.find::<rejection::Rejection>() {
        render_failure(&logger, r)
    } else if let Some(e) = rej.find::<reject::InvalidQuery>() {
        error!(logger, "Malformed query string"; "error" => %e);

        json(&response::ErrorResponse {
            error: String::from("invalid query string"),
            uid: None,
        })
    } else {
        return Err(rej);
    };

    Ok(with_header(
        reply,
        handlers::SERVER_TIMING_HEADER,
        handlers::format_server_timing("recover", start.elapsed()),
    ))
}

/// Logs a failed operation and renders its `error` body.
fn render_failure(logger: &Logger, r: &rejection::Rejection) -> Json {
    let failure = &r.failure;
    error!(logger, "Backend error"; "context" => ?r.context, "error" => ?failure.error, "uid" => ?failure.uid, "message" => %failure.error);

    json(&r.flatten())
}

/// Decodes the query string and any urlencoded body into one bag of
/// parameters. Body values come after query values.
fn params() -> impl Filter<Extract = (FormParams,), Error = reject::Rejection> + Clone {
    let body = warp::body::content_length_limit(MAX_FORM_LENGTH)
        .and(warp::body::form::<Vec<(String, String)>>())
        .or(warp::any().map(Vec::<(String, String)>::new))
        .unify();

    warp::query::<Vec<(String, String)>>()
        .and(body)
        .map(|mut pairs: Vec<(String, String)>, body: Vec<(String, String)>| {
            pairs.extend(body);
            FormParams::new(pairs)
        })
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{get as g, path as p, post};

    use super::{handlers, params};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route {
        ($name:ident => $handler:ident; $group:literal / $action:literal) => (
            pub fn $name(environment: Environment) -> Route {
                warp::any()
                    .map(move || environment.clone())
                    .and(p($group))
                    .and(p($action))
                    .and(end())
                    .and(g().or(post()).unify())
                    .and(params())
                    .and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_get_user_route => get_user; "info" / "user");
    route!(make_get_event_route => get_event; "info" / "event");
    route!(make_get_user_events_route => get_user_events; "info" / "userevents");
    route!(make_create_event_route => create_event; "create" / "event");
    route!(make_edit_event_route => edit_event; "edit" / "event");
    route!(make_create_user_route => create_user; "create" / "user");
    route!(make_edit_user_route => edit_user; "edit" / "user");
    route!(make_delete_event_route => delete_event; "delete" / "event");
    route!(make_delete_user_route => delete_user; "delete" / "user");
}
