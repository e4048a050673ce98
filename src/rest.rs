use std::time::Duration;
use reqwest::{Client, StatusCode};
use serenity::async_trait;
use tracing::{debug, error};
use crate::error::FetchError;
use crate::model::track::TrackInfo;
use crate::source::TrackSource;

/// Http client for the station's metadata API.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    current_track_url: String
}

impl RestClient {
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            current_track_url: format!("{}/track/current", api_base_url.trim_end_matches('/'))
        })
    }

    pub async fn current_track(&self) -> Result<TrackInfo, FetchError> {
        let response = self.http.get(&self.current_track_url).send().await?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TrackSource for RestClient {
    async fn fetch_current_track(&self) -> Option<TrackInfo> {
        match self.current_track().await {
            Ok(track) => {
                debug!("Fetched current track: {}", track.title);
                Some(track)
            },
            Err(e) => {
                error!("Error fetching track data: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a single canned http response per connection.
    async fn serve(status: &'static str, body: &'static str, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = stream.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn client(base: &str) -> RestClient {
        RestClient::new(base, Duration::from_millis(500)).unwrap()
    }

    #[tokio::test]
    async fn parses_current_track() {
        let base = serve(
            "200 OK",
            r#"{"title":"Song A","artist":"Band","duration":"180","cover":null}"#,
            Duration::ZERO
        ).await;

        let track = client(&base).fetch_current_track().await.unwrap();
        assert_eq!(track.title, "Song A");
        assert_eq!(track.artist.as_deref(), Some("Band"));
        assert_eq!(track.duration_seconds, Some(180));
        assert_eq!(track.cover_url, None);
    }

    #[tokio::test]
    async fn non_200_is_none() {
        let base = serve("503 Service Unavailable", r#"{"title":"Song A"}"#, Duration::ZERO).await;

        assert!(matches!(client(&base).current_track().await, Err(FetchError::Status(s)) if s.as_u16() == 503));
        assert!(client(&base).fetch_current_track().await.is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_none() {
        let base = serve("200 OK", r#"{"artist":"no title here""#, Duration::ZERO).await;

        assert!(matches!(client(&base).current_track().await, Err(FetchError::Decode(_))));
        assert!(client(&base).fetch_current_track().await.is_none());
    }

    #[tokio::test]
    async fn hung_upstream_times_out() {
        let base = serve("200 OK", r#"{"title":"late"}"#, Duration::from_secs(5)).await;

        let started = std::time::Instant::now();
        assert!(client(&base).fetch_current_track().await.is_none());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unreachable_host_is_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(client(&format!("http://{addr}")).fetch_current_track().await.is_none());
    }
}
