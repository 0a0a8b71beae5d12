//! Line reader over a continuous `_changes` response.

use crate::error::ClientError;
use futures::TryStreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio_util::io::StreamReader;

/// Newline-delimited lines of a streaming feed, read as they arrive.
pub struct ChangesLines {
    url: String,
    lines: Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>,
}

impl ChangesLines {
    pub(crate) fn new(url: String, response: reqwest::Response) -> Self {
        let body = response.bytes_stream().map_err(std::io::Error::other);
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(StreamReader::new(Box::pin(body)));
        Self {
            url,
            lines: BufReader::new(reader).lines(),
        }
    }

    /// The next line, or `None` once the server closes the stream.
    ///
    /// Suspends until a full line is available.
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        self.lines.next_line().await.map_err(|e| ClientError::StreamInterrupted {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
