use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{ready, BoxFuture, FutureExt};
use url::{ParseError, Url};

use crate::errors::BackendError;
use crate::store::Store;

/// A stored object: its content type and bytes.
pub type StoredObject = (String, Vec<u8>);

/// A store that keeps objects in memory. Saves can be made to fail to
/// exercise cleanup paths.
pub struct MockStore {
    map: RwLock<HashMap<String, StoredObject>>,
    base_url: Url,
    failing: bool,
}

impl MockStore {
    pub fn new(base_url: Url) -> Self {
        MockStore {
            map: RwLock::new(HashMap::new()),
            base_url,
            failing: false,
        }
    }

    /// Creates a store that refuses every save.
    pub fn failing(base_url: Url) -> Self {
        MockStore {
            failing: true,
            ..Self::new(base_url)
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MockStore {
    type Raw = Vec<u8>;

    fn delete(&self, key: &str) -> BoxFuture<Result<(), BackendError>> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        ready(Ok(())).boxed()
    }

    fn get_url(&self, key: &str) -> Result<Url, ParseError> {
        self.base_url.join(key)
    }

    fn save(
        &self,
        key: &str,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), BackendError>> {
        if self.failing {
            return ready(Err(BackendError::external_fetch(format!(
                "unable to store {}",
                key
            ))))
            .boxed();
        }

        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), (content_type, raw));

        ready(Ok(())).boxed()
    }
}
