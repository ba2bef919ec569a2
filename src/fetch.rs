//! Streams ready archives from the retrieval endpoint to staging files.
//!
//! The endpoint runs retrieval jobs asynchronously: a request answered with
//! 202 means the job is still being prepared. The fetcher drives each
//! request through the configured [`RetryPolicy`] and streams the archive
//! body to disk once the job is ready.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use reqwest::StatusCode;

use crate::{
    errors::FetchError,
    request::RetrievalRequest,
    retry::{RetryError, RetryPolicy},
};

pub struct Fetcher {
    client: reqwest::Client,
    endpoint: String,
    policy: RetryPolicy,
}

/// A completed fetch. The original service occasionally answers a ready job
/// with an empty body; that is reported instead of staging a zero-byte
/// archive.
#[derive(Debug, PartialEq)]
pub enum FetchOutcome {
    Saved(u64),
    Empty,
}

impl Fetcher {
    pub fn new(endpoint: &str, policy: RetryPolicy) -> Self {
        Fetcher {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            policy,
        }
    }

    /// POSTs the retrieval request until the remote job is ready, then
    /// streams the archive to `dest`.
    pub async fn fetch_archive(
        &self,
        request: &RetrievalRequest,
        dest: &Path,
        bar: &ProgressBar,
    ) -> Result<FetchOutcome, RetryError<FetchError>> {
        self.policy.run(|| self.try_fetch(request, dest, bar)).await
    }

    async fn try_fetch(
        &self,
        request: &RetrievalRequest,
        dest: &Path,
        bar: &ProgressBar,
    ) -> Result<FetchOutcome, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(classify_request_error)?;

        if let Some(error) = classify_status(response.status()) {
            return Err(error);
        }

        if let Some(total) = response.content_length() {
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
                )
                .unwrap()
                .progress_chars("=> "),
            );
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Stage {
                path: dest.to_path_buf(),
                source,
            })?;
        }
        let mut file = File::create(dest).map_err(|source| FetchError::Stage {
            path: dest.to_path_buf(),
            source,
        })?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify_request_error)?;
            file.write_all(&chunk).map_err(|source| FetchError::Stage {
                path: dest.to_path_buf(),
                source,
            })?;
            downloaded += chunk.len() as u64;
            bar.set_position(downloaded);
        }

        if downloaded == 0 {
            debug!("endpoint answered with an empty body for {}", dest.display());
            return Ok(FetchOutcome::Empty);
        }

        Ok(FetchOutcome::Saved(downloaded))
    }
}

/// 202 means the remote job is still running; 5xx is worth another try;
/// any other non-success status is fatal for the task.
fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status == StatusCode::ACCEPTED {
        Some(FetchError::JobPending)
    } else if status.is_server_error() {
        Some(FetchError::Transient(format!("server answered {}", status)))
    } else if !status.is_success() {
        Some(FetchError::Status(status))
    } else {
        None
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_connect() || e.is_timeout() {
        FetchError::Transient(e.to_string())
    } else {
        FetchError::Http(e)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {

    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use crate::{request::RetrievalRequest, retry::Retryable};

    use super::*;

    #[test]
    fn should_treat_accepted_as_pending() {
        let error = classify_status(StatusCode::ACCEPTED).unwrap();

        assert!(matches!(error, FetchError::JobPending));
        assert!(error.is_retryable());
    }

    #[test]
    fn should_treat_server_errors_as_transient() {
        let error = classify_status(StatusCode::SERVICE_UNAVAILABLE).unwrap();

        assert!(matches!(error, FetchError::Transient(_)));
        assert!(error.is_retryable());
    }

    #[test]
    fn should_treat_client_errors_as_fatal() {
        let error = classify_status(StatusCode::FORBIDDEN).unwrap();

        assert!(matches!(error, FetchError::Status(_)));
        assert!(!error.is_retryable());
    }

    #[test]
    fn should_accept_success_statuses() {
        assert!(classify_status(StatusCode::OK).is_none());
    }

    fn request_fixture() -> RetrievalRequest {
        RetrievalRequest::builder()
            .product_family("crop_productivity_indicators")
            .crop_type("maize")
            .growing_season("1st_season_per_campaign")
            .variable("crop_development_stage")
            .year(2019)
            .build()
            .unwrap()
    }

    fn one_shot_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        }
    }

    // Drains the whole request (headers plus content-length body) so the
    // client never sees a reset, then answers with a canned response.
    async fn serve_once(listener: TcpListener, response: &'static str) {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if n == 0 {
                return;
            }

            let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + body_len {
                return;
            }
        }
    }

    #[tokio::test]
    async fn should_stream_archive_body_to_staging_file() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_once(
            listener,
            "HTTP/1.1 200 OK\r\ncontent-length: 9\r\nconnection: close\r\n\r\ngrid data",
        ));

        let fetcher = Fetcher::new(&format!("http://{}", addr), one_shot_policy());
        let tmp_dir = TempDir::new().unwrap();
        let dest = tmp_dir.path().join("2019/archive.zip");
        let bar = ProgressBar::hidden();

        let outcome = fetcher
            .fetch_archive(&request_fixture(), &dest, &bar)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Saved(9));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "grid data");
    }

    #[tokio::test]
    async fn should_report_empty_body_instead_of_staging_data() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_once(
            listener,
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ));

        let fetcher = Fetcher::new(&format!("http://{}", addr), one_shot_policy());
        let tmp_dir = TempDir::new().unwrap();
        let dest = tmp_dir.path().join("2019/archive.zip");
        let bar = ProgressBar::hidden();

        let outcome = fetcher
            .fetch_archive(&request_fixture(), &dest, &bar)
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Empty);
        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);
    }
}
