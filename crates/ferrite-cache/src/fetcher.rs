//! HTTP fetcher for a GCS-compatible object store endpoint.

use async_trait::async_trait;
use ferrite_core::ports::{ByteStream, ObjectFetcher};
use ferrite_core::{Error, Result};
use futures::TryStreamExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

/// Everything outside the RFC 3986 unreserved set. Escaping this much keeps
/// `/`, `#`, `?`, and `%` in object names from being read as URL structure.
const OBJECT_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Fetches objects over the GCS JSON API media-download endpoint
/// (`/storage/v1/b/{bucket}/o/{object}?alt=media`), which local emulators
/// such as fake-gcs-server also serve. No credentials are attached; the
/// endpoint is expected to be an emulator or an internal gateway.
pub struct HttpObjectFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpObjectFetcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn media_url(&self, bucket: &str, object: &str) -> String {
        // The object name is a single path element in the JSON API.
        let encoded = utf8_percent_encode(object, OBJECT_SEGMENT);
        format!("{}/storage/v1/b/{}/o/{}", self.endpoint, bucket, encoded)
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let url = self.media_url(bucket, key);
        debug!(bucket, key, %url, "fetching object from remote store");

        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|err| Error::FetchFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Error::FetchFailed {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: format!("remote returned status {status}"),
            });
        }

        let bucket = bucket.to_string();
        let key = key.to_string();
        let stream = response
            .bytes_stream()
            .map_err(move |err| Error::FetchFailed {
                bucket: bucket.clone(),
                key: key.clone(),
                reason: err.to_string(),
            });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(mut stream: ByteStream) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn fetches_media_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/models/o/weights.bin"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc123".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(server.uri());
        let stream = fetcher.fetch("models", "weights.bin").await.unwrap();
        assert_eq!(collect(stream).await.unwrap(), b"abc123");
    }

    #[tokio::test]
    async fn missing_object_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(server.uri());
        let Err(err) = fetcher.fetch("models", "nope").await else {
            panic!("expected a lookup failure");
        };
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_maps_to_fetch_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(server.uri());
        let Err(err) = fetcher.fetch("models", "thing").await else {
            panic!("expected a fetch failure");
        };
        assert!(matches!(err, Error::FetchFailed { .. }));
        assert!(err.is_fetch_failure());
    }

    #[test]
    fn object_names_are_encoded_as_one_path_segment() {
        let fetcher = HttpObjectFetcher::new("http://gcs:4443/");
        assert_eq!(
            fetcher.media_url("b", "dir/file.bin"),
            "http://gcs:4443/storage/v1/b/b/o/dir%2Ffile.bin"
        );
        assert_eq!(
            fetcher.media_url("b", "a#frag"),
            "http://gcs:4443/storage/v1/b/b/o/a%23frag"
        );
        assert_eq!(
            fetcher.media_url("b", "a?x=1"),
            "http://gcs:4443/storage/v1/b/b/o/a%3Fx%3D1"
        );
        assert_eq!(
            fetcher.media_url("b", "100%.bin"),
            "http://gcs:4443/storage/v1/b/b/o/100%25.bin"
        );
    }

    #[tokio::test]
    async fn fragment_character_reaches_the_server_intact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(server.uri());
        let stream = fetcher.fetch("b", "a#frag").await.unwrap();
        assert_eq!(collect(stream).await.unwrap(), b"ok");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.path(), "/storage/v1/b/b/o/a%23frag");
    }
}
