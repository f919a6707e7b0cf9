use std::collections::HashMap;

use futures::future::{ready, BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::fetch::{Fetcher, Image};

/// A fetcher that serves a fixed set of images and fails for every
/// other URL.
#[derive(Default)]
pub struct MockFetcher {
    images: HashMap<String, Image>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(
        mut self,
        url: impl Into<String>,
        content_type: impl Into<String>,
        extension: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.images.insert(
            url.into(),
            Image {
                bytes,
                content_type: content_type.into(),
                extension: extension.into(),
            },
        );

        self
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<Result<Image, BackendError>> {
        let result = self.images.get(url).cloned().ok_or_else(|| {
            BackendError::external_fetch(format!("unable to retrieve image from {}", url))
        });

        ready(result).boxed()
    }
}
