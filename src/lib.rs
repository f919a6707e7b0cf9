pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod fetch;
pub mod lookup;
pub mod models;
pub mod params;
pub mod parse;
pub mod reconcile;
pub mod removal;
pub mod resolve;
pub mod routes;
pub mod store;

#[cfg(test)]
mod testing;
