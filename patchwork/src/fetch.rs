//! Fetching and decoding of upstream tiles.

use bytes::Bytes;
use image::RgbaImage;
use reqwest::header::USER_AGENT;
use std::time::Duration;

pub use reqwest::header::HeaderValue;

/// Controls how the compositor talks to the upstream tile service.
pub struct HttpOptions {
    /// User agent to be sent to the tile servers.
    pub user_agent: Option<HeaderValue>,

    /// How many times a failed fetch is re-issued before its sub-tile is given up on and
    /// left blank.
    pub max_retries: u32,

    /// Pause between a failure and its re-issue.
    pub retry_delay: Duration,

    /// Maximum number of host tiles composited at the same time.
    pub max_parallel_composites: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: Some(HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION"),
            ))),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            max_parallel_composites: 6,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not a decodable image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Download and decode one tile, re-issuing failed attempts after a delay. At most one
/// terminal outcome comes out of this, no matter how the individual attempts fail.
pub(crate) async fn fetch_image(
    client: &reqwest::Client,
    url: &str,
    options: &HttpOptions,
) -> Result<RgbaImage, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_image_once(client, url, options).await {
            Ok(image) => return Ok(image),
            Err(e) if attempt < options.max_retries => {
                attempt += 1;
                log::warn!(
                    "Fetching '{url}' failed: {e}. Retry {attempt} of {}.",
                    options.max_retries
                );
                tokio::time::sleep(options.retry_delay).await;
            }
            Err(e) => {
                log::warn!("Giving up on '{url}': {e}.");
                return Err(e);
            }
        }
    }
}

async fn fetch_image_once(
    client: &reqwest::Client,
    url: &str,
    options: &HttpOptions,
) -> Result<RgbaImage, FetchError> {
    let mut request = client.get(url);
    if let Some(user_agent) = &options.user_agent {
        request = request.header(USER_AGENT, user_agent.clone());
    }

    let response = request.send().await?;
    log::debug!("Downloaded '{url}': {:?}.", response.status());

    let bytes: Bytes = response.error_for_status()?.bytes().await?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemock::StatusCode;

    fn options() -> HttpOptions {
        HttpOptions {
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fetching_a_tile() {
        let _ = env_logger::try_init();

        let server = tilemock::Server::bind().await;
        server
            .anticipate("/1/2/3")
            .await
            .respond(tilemock::solid_tile(256, [0, 255, 0, 255]));

        let url = format!("http://localhost:{}/1/2/3", server.port());
        let image = fetch_image(&reqwest::Client::new(), &url, &options())
            .await
            .unwrap();

        assert_eq!(image.dimensions(), (256, 256));
        assert_eq!(image.get_pixel(128, 128).0, [0, 255, 0, 255]);
    }

    #[tokio::test]
    async fn exhausting_retries_makes_exactly_three_attempts() {
        let _ = env_logger::try_init();

        let server = tilemock::Server::bind().await;
        for _ in 0..3 {
            server
                .anticipate("/1/2/3")
                .await
                .respond_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }

        let url = format!("http://localhost:{}/1/2/3", server.port());
        let result = fetch_image(&reqwest::Client::new(), &url, &options()).await;

        assert!(result.is_err());
        assert_eq!(server.hits("/1/2/3"), 3);
    }

    #[tokio::test]
    async fn failed_attempt_is_retried() {
        let _ = env_logger::try_init();

        let server = tilemock::Server::bind().await;
        server
            .anticipate("/1/2/3")
            .await
            .respond_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        server
            .anticipate("/1/2/3")
            .await
            .respond(tilemock::solid_tile(256, [255, 0, 0, 255]));

        let url = format!("http://localhost:{}/1/2/3", server.port());
        let image = fetch_image(&reqwest::Client::new(), &url, &options())
            .await
            .unwrap();

        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(server.hits("/1/2/3"), 2);
    }

    #[tokio::test]
    async fn garbage_payload_is_an_error() {
        let _ = env_logger::try_init();

        let server = tilemock::Server::bind().await;
        for _ in 0..3 {
            server
                .anticipate("/1/2/3")
                .await
                .respond(bytes::Bytes::from_static(b"definitely not an image"));
        }

        let url = format!("http://localhost:{}/1/2/3", server.port());
        let result = fetch_image(&reqwest::Client::new(), &url, &options()).await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }
}
