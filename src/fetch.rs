use futures::future::{BoxFuture, FutureExt};
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use url::Url;

use crate::environment::Config;
use crate::errors::BackendError;

pub mod mock;

/// A downloaded image.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub bytes: Vec<u8>,

    /// The essence of the MIME type, e.g. `image/png`.
    pub content_type: String,

    /// The file extension matching `content_type`, without a dot.
    pub extension: String,
}

/// Retrieves remote images.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<Result<Image, BackendError>>;
}

/// A fetcher that downloads images over HTTP.
pub struct HttpFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.image_fetch_timeout)
            .build()?;

        Ok(HttpFetcher {
            client,
            max_bytes: config.max_image_bytes,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<Result<Image, BackendError>> {
        download(self, url.to_owned()).boxed()
    }
}

async fn download(fetcher: &HttpFetcher, raw_url: String) -> Result<Image, BackendError> {
    let url = Url::parse(&raw_url)
        .map_err(|_| BackendError::external_fetch(format!("invalid image URL {}", raw_url)))?;

    let unreachable = |_: reqwest::Error| {
        BackendError::external_fetch(format!("unable to retrieve image from {}", raw_url))
    };

    let mut response = fetcher
        .client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(unreachable)?;

    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok());

    let extension = mime_type.as_ref().and_then(extension_for);

    let (mime_type, extension) = match (mime_type, extension) {
        (Some(mime_type), Some(extension)) => (mime_type, extension),
        _ => {
            return Err(BackendError::external_fetch(format!(
                "{} does not point to an image",
                raw_url
            )))
        }
    };

    let too_large = || {
        BackendError::external_fetch(format!(
            "image at {} is larger than {} bytes",
            raw_url, fetcher.max_bytes
        ))
    };

    if response.content_length().unwrap_or(0) > fetcher.max_bytes as u64 {
        return Err(too_large());
    }

    let mut bytes = Vec::new();

    // chunked bodies carry no length up front
    while let Some(chunk) = response.chunk().await.map_err(unreachable)? {
        if bytes.len() + chunk.len() > fetcher.max_bytes {
            return Err(too_large());
        }

        bytes.extend_from_slice(&chunk);
    }

    Ok(Image {
        bytes,
        content_type: mime_type.essence_str().to_owned(),
        extension,
    })
}

/// Returns the file extension to store an image of type `mime_type`
/// under, or `None` if it is not an image.
pub fn extension_for(mime_type: &Mime) -> Option<String> {
    if mime_type.type_() != mime::IMAGE {
        return None;
    }

    let subtype = mime_type.subtype();

    let extension = if subtype == mime::JPEG {
        "jpg"
    } else if subtype == mime::SVG {
        "svg"
    } else {
        subtype.as_str()
    };

    Some(extension.to_owned())
}
