use std::sync::Arc;
use std::time::Duration;

use log::Logger;

use crate::db::DynDb;
use crate::fetch::Fetcher;
use crate::store::Store;

pub type VecStore = dyn Store<Raw = Vec<u8>> + Send + Sync;
pub type DynFetcher = dyn Fetcher + Send + Sync;

/// The collaborators shared by every route.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<DynDb>,
    pub store: Arc<VecStore>,
    pub fetcher: Arc<DynFetcher>,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<DynDb>,
        store: Arc<VecStore>,
        fetcher: Arc<DynFetcher>,
    ) -> Self {
        Self {
            logger,
            db,
            store,
            fetcher,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How long to wait for a profile picture download.
    pub(crate) image_fetch_timeout: Duration,

    /// The largest profile picture accepted.
    pub(crate) max_image_bytes: usize,
}

impl Config {
    pub fn new(image_fetch_timeout: Duration, max_image_bytes: usize) -> Self {
        Self {
            image_fetch_timeout,
            max_image_bytes,
        }
    }

    /// Reads `EATUP_IMAGE_FETCH_TIMEOUT_SECONDS` and `EATUP_MAX_IMAGE_BYTES`.
    pub fn from_env() -> Self {
        use crate::config::get_parsed_variable;

        Self::new(
            Duration::from_secs(get_parsed_variable("EATUP_IMAGE_FETCH_TIMEOUT_SECONDS")),
            get_parsed_variable("EATUP_MAX_IMAGE_BYTES"),
        )
    }
}
