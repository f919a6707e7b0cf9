//! A helper program to create the event-planning tables in a fresh
//! database, or bring an existing one up to date.

use std::env;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger};

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = env::var("EATUP_DB_CONNECTION_STRING")
        .expect("could not read EATUP_DB_CONNECTION_STRING");
    let migration_dir =
        env::var("EATUP_MIGRATION_DIR").unwrap_or_else(|_| String::from("./migrations"));

    info!(logger, "Preparing database..."; "name" => info::NAME, "migration_dir" => &migration_dir);

    let client = Client::connect(&connection_string, NoTls).expect("could not connect to database");

    let mut movine = Movine::new(client);
    movine.set_migration_dir(&migration_dir);

    if movine.status().is_err() {
        debug!(logger, "Initializing movine...");
        movine.initialize().expect("failed to initialize movine")
    }

    debug!(logger, "Running migrations...");
    movine.up().expect("failed to run migrations");

    debug!(logger, "Completed initialization.");
}
