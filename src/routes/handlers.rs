use std::time::{Duration, Instant};

use log::{debug, Logger};
use warp::{
    reject,
    reply::{json, with_header, Reply},
};

use crate::environment::Environment;
use crate::params::FormParams;
use crate::routes::{
    rejection::{Context, Rejection},
    render_failure,
    response::SuccessResponse,
};
use crate::{lookup, reconcile, removal};

pub(crate) const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

/// Runs the body and adds a `server-timing` header to whatever it
/// produces, failures included.
macro_rules! timed {
    ($logger:expr; $($body:tt)+) => {{
        let start = Instant::now();

        let result: Result<_, Rejection> = async { $($body)+ }.await;

        finish(&$logger, result, start.elapsed())
    }};
}

fn finish<T: Reply + 'static>(
    logger: &Logger,
    result: Result<T, Rejection>,
    elapsed: Duration,
) -> RouteResult {
    let timing = format_server_timing("handler", elapsed);

    let reply: Box<dyn Reply> = match result {
        Ok(reply) => Box::new(with_header(reply, SERVER_TIMING_HEADER, timing)),
        Err(rejection) => Box::new(with_header(
            render_failure(logger, &rejection),
            SERVER_TIMING_HEADER,
            timing,
        )),
    };

    Ok(reply)
}

pub async fn get_user(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        let view = lookup::get_user(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::GetUser, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::User(view)))
    }
}

pub async fn get_event(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        let view = lookup::get_event(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::GetEvent, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::Event(view)))
    }
}

pub async fn get_user_events(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        let view = lookup::get_user_events(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::GetUserEvents, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::UserEvents(view)))
    }
}

pub async fn create_event(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        debug!(environment.logger, "Creating event...");
        let eid = reconcile::create_event(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::CreateEvent, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::event_saved(eid)))
    }
}

pub async fn edit_event(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        debug!(environment.logger, "Editing event...");
        let eid = reconcile::edit_event(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::EditEvent, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::event_saved(eid)))
    }
}

pub async fn create_user(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        debug!(environment.logger, "Creating user...");
        let uid = reconcile::create_user(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::CreateUser, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::user_saved(uid)))
    }
}

pub async fn edit_user(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        debug!(environment.logger, "Editing user...");
        let uid = reconcile::edit_user(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::EditUser, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::user_saved(uid)))
    }
}

pub async fn delete_event(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        let eid = removal::delete_event(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::DeleteEvent, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::event_saved(eid)))
    }
}

pub async fn delete_user(environment: Environment, params: FormParams) -> RouteResult {
    timed! { environment.logger;
        let uid = removal::delete_user(&environment, &params)
            .await
            .map_err(|e| Rejection::new(Context::DeleteUser, e))?;

        Ok::<_, Rejection>(json(&SuccessResponse::user_saved(uid)))
    }
}

pub(crate) fn format_server_timing(name: &str, elapsed: Duration) -> String {
    format!("{};dur={}", name, elapsed.as_secs_f64() * 1000.0)
}
