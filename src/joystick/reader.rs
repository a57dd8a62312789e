use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use super::event::RawEvent;

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Cannot open joystick device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from joystick device failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("Short read from joystick device: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("Joystick device closed")]
    Closed,
}

/// Anything that yields whole joystick records, one per call
#[allow(async_fn_in_trait)]
pub trait EventSource {
    async fn next_record(&mut self) -> Result<RawEvent, ReaderError>;
}

/// Reads `js_event` records from a byte stream
///
/// Every call issues a single read sized to one record. The joystick driver
/// only ever hands out whole records, so anything shorter is reported as an
/// error instead of being stitched together with the next read.
pub struct JoystickReader<R> {
    inner: R,
}

impl JoystickReader<File> {
    /// Open a joystick device read-only
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        debug!("Opening joystick device {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .await
            .map_err(|source| ReaderError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Opened joystick device {}", path.display());
        Ok(Self::new(file))
    }
}

impl<R: AsyncRead + Unpin> JoystickReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: AsyncRead + Unpin> EventSource for JoystickReader<R> {
    async fn next_record(&mut self) -> Result<RawEvent, ReaderError> {
        let mut buf = [0u8; RawEvent::SIZE];
        let read = self.inner.read(&mut buf).await?;

        match read {
            0 => Err(ReaderError::Closed),
            RawEvent::SIZE => Ok(RawEvent::from_bytes(buf)),
            actual => Err(ReaderError::ShortRead {
                expected: RawEvent::SIZE,
                actual,
            }),
        }
    }
}
