use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use sqlx::postgres::PgPool;
use tokio::sync::mpsc;

use eatup::config::{get_parsed_variable, get_variable};
use eatup::db::PgDb;
use eatup::environment::{Config, Environment};
use eatup::fetch::HttpFetcher;
use eatup::routes;
use eatup::store::S3Store;
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    #[cfg(feature = "env_logging")]
    let (logger, _guard) = log::initialize_env_logger()?;

    #[cfg(not(feature = "env_logging"))]
    let logger = log::initialize_logger();

    let store = Arc::new(S3Store::from_env().expect("initialize S3 store from environment"));

    let main_port: u16 = get_parsed_variable("EATUP_PORT");
    let admin_port: u16 = get_parsed_variable("EATUP_ADMIN_PORT");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let config = Config::from_env();
    let fetcher = Arc::new(HttpFetcher::new(&config)?);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("EATUP_DB_CONNECTION_STRING");
    let pool = PgPool::connect(&connection_string)
        .await
        .expect("create database pool from EATUP_DB_CONNECTION_STRING");
    let db = Arc::new(PgDb::new(pool));

    let environment = Environment::new(logger.clone(), db, store, fetcher);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown has begun
            termination_sender.send(()).await.ok();
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let (_, main_server) = warp::serve(routes::make_api(environment.clone()))
            .bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_admin(environment.clone(), terminate);

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
