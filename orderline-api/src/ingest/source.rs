//! Inbound message sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Failure to receive the next message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecvError {
    /// The stream has ended; no further messages will arrive.
    #[error("message stream closed")]
    Closed,

    /// A transient failure. The next `recv` may succeed.
    #[error("receive failed: {0}")]
    Transport(String),
}

/// Failure to hand a message to the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("ingestion pipeline is not running")]
    Closed,
}

/// A stream of raw inbound messages.
///
/// `recv` must be cancel safe: the pipeline races it against shutdown.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message payload.
    async fn recv(&mut self) -> Result<Vec<u8>, RecvError>;
}

/// Create a bounded in-process stream.
pub fn channel(capacity: usize) -> (MessagePublisher, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessagePublisher { tx }, ChannelSource { rx })
}

/// Receiving half of the in-process stream.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Result<Vec<u8>, RecvError> {
        self.rx.recv().await.ok_or(RecvError::Closed)
    }
}

/// Sending half of the in-process stream. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MessagePublisher {
    tx: mpsc::Sender<Vec<u8>>,
}

impl MessagePublisher {
    /// Enqueue one message, waiting while the channel is full.
    pub async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
        self.tx.send(payload).await.map_err(|_| PublishError::Closed)
    }

    /// Whether the pipeline side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Replays a newline-delimited file of messages, then reports end of stream.
///
/// Blank lines are skipped. Each remaining line is one message, passed on as
/// raw bytes. A read error is reported once; the source then reports end of
/// stream.
pub struct JsonLinesSource {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of the current line. Kept across a cancelled `recv`.
    pending: Vec<u8>,
    exhausted: bool,
}

impl JsonLinesSource {
    /// Open `path` for replay.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            pending: Vec::new(),
            exhausted: false,
        })
    }

    /// File being replayed.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageSource for JsonLinesSource {
    async fn recv(&mut self) -> Result<Vec<u8>, RecvError> {
        while !self.exhausted {
            match self.reader.read_until(b'\n', &mut self.pending).await {
                Ok(0) if self.pending.is_empty() => self.exhausted = true,
                Ok(_) => {
                    let line = trim_line_ending(std::mem::take(&mut self.pending));
                    if !line.iter().all(u8::is_ascii_whitespace) {
                        return Ok(line);
                    }
                }
                Err(e) => {
                    self.exhausted = true;
                    return Err(RecvError::Transport(format!(
                        "{}: {}",
                        self.path.display(),
                        e
                    )));
                }
            }
        }
        Err(RecvError::Closed)
    }
}

fn trim_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_preserves_order() -> Result<(), Box<dyn std::error::Error>> {
        let (publisher, mut source) = channel(4);
        publisher.publish(b"one".to_vec()).await?;
        publisher.publish(b"two".to_vec()).await?;

        assert_eq!(source.recv().await?, b"one".to_vec());
        assert_eq!(source.recv().await?, b"two".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_closed_when_publishers_dropped() {
        let (publisher, mut source) = channel(1);
        drop(publisher);
        assert_eq!(source.recv().await, Err(RecvError::Closed));
    }

    #[tokio::test]
    async fn test_publish_fails_without_pipeline() {
        let (publisher, source) = channel(1);
        drop(source);
        assert!(publisher.is_closed());
        assert_eq!(publisher.publish(b"{}".to_vec()).await, Err(PublishError::Closed));
    }

    #[tokio::test]
    async fn test_json_lines_skips_blank_lines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("replay.jsonl");
        std::fs::write(&path, "{\"a\":1}\n\n   \n{\"b\":2}\n")?;

        let mut source = JsonLinesSource::open(&path).await?;
        assert_eq!(source.recv().await?, b"{\"a\":1}".to_vec());
        assert_eq!(source.recv().await?, b"{\"b\":2}".to_vec());
        assert_eq!(source.recv().await, Err(RecvError::Closed));
        Ok(())
    }

    #[tokio::test]
    async fn test_json_lines_passes_raw_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("replay.jsonl");
        std::fs::write(&path, b"{\"a\":\"\xff\xfe\"}\r\n{\"b\":2}")?;

        let mut source = JsonLinesSource::open(&path).await?;
        assert_eq!(source.recv().await?, b"{\"a\":\"\xff\xfe\"}".to_vec());
        assert_eq!(source.recv().await?, b"{\"b\":2}".to_vec());
        assert_eq!(source.recv().await, Err(RecvError::Closed));
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_json_lines_read_error_ends_stream() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        // Opening a directory succeeds on Linux; reading it fails.
        let mut source = JsonLinesSource::open(dir.path()).await?;
        assert!(matches!(source.recv().await, Err(RecvError::Transport(_))));
        assert_eq!(source.recv().await, Err(RecvError::Closed));
        assert_eq!(source.recv().await, Err(RecvError::Closed));
        Ok(())
    }

    #[tokio::test]
    async fn test_json_lines_missing_file() {
        assert!(JsonLinesSource::open("/definitely/not/here.jsonl").await.is_err());
    }
}
