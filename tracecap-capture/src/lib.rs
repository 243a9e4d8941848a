//! Capture stream for tracecap recordings.
//!
//! A capture file is an append-only multiplex of events produced by every
//! instrument participating in one recording session. The layout is
//! deliberately minimal: an 8-byte magic header followed by length-prefixed
//! JSON frames. Anything that understands the frame envelope can consume a
//! capture without knowing which instruments produced it.
//!
//! [`CaptureWriter`] is safe for concurrent append from multiple tasks; all
//! writes are serialized internally. [`CaptureReader`] iterates frames back
//! in write order and is primarily used by tests and analysis tooling.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// File magic written at offset 0 of every capture.
pub const CAPTURE_MAGIC: &[u8; 8] = b"TCAP\x00\x01\x00\x00";

/// Default writer buffer size (8 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture target {0} already exists")]
    TargetExists(PathBuf),

    #[error("not a capture file: bad magic header")]
    BadMagic,

    #[error("capture frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One multiplexed event in the capture stream.
///
/// `time_ns` is relative to the start of the recording session. `source`
/// names the instrument that produced the event; `kind` identifies the
/// payload schema within that instrument's vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub time_ns: u64,
    pub source: String,
    pub kind: String,
    pub payload: serde_json::Value,
}

impl CaptureEvent {
    pub fn new(
        time_ns: u64,
        source: impl Into<String>,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self { time_ns, source: source.into(), kind: kind.into(), payload }
    }
}

/// Append-only capture writer bound to one file.
///
/// Created exclusively: refuses to touch an existing target unless
/// `overwrite` is set, in which case the target is truncated and recreated.
/// Writes go through an internal buffer of caller-chosen size; nothing is
/// durable until [`flush`](CaptureWriter::flush).
#[derive(Debug)]
pub struct CaptureWriter {
    inner: Mutex<BufWriter<File>>,
}

impl CaptureWriter {
    /// Create the capture file and write the magic header.
    ///
    /// # Errors
    /// [`CaptureError::TargetExists`] if the target exists and `overwrite`
    /// is false; I/O errors otherwise. Nothing is written on failure.
    pub fn create(
        path: impl AsRef<Path>,
        overwrite: bool,
        buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let file = if overwrite {
            OpenOptions::new().write(true).create(true).truncate(true).open(path)?
        } else {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(CaptureError::TargetExists(path.to_path_buf()));
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mut writer = BufWriter::with_capacity(buffer_size, file);
        writer.write_all(CAPTURE_MAGIC)?;
        Ok(Self { inner: Mutex::new(writer) })
    }

    /// Append one event frame. Safe to call from multiple tasks; frames are
    /// never interleaved.
    ///
    /// # Errors
    /// Serialization or I/O failure. A failed append leaves the stream
    /// positioned at the previous frame boundary.
    pub fn write(&self, event: &CaptureEvent) -> Result<(), CaptureError> {
        let frame = serde_json::to_vec(event)?;
        let len = u32::try_from(frame.len())
            .map_err(|_| CaptureError::FrameTooLarge(frame.len()))?;

        let mut writer = self.inner.lock().unwrap();
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&frame)?;
        Ok(())
    }

    /// Flush buffered frames to the underlying file.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    pub fn flush(&self) -> Result<(), CaptureError> {
        let mut writer = self.inner.lock().unwrap();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Sequential reader over a capture file's frames.
#[derive(Debug)]
pub struct CaptureReader {
    inner: BufReader<File>,
}

impl CaptureReader {
    /// Open a capture file and validate its magic header.
    ///
    /// # Errors
    /// [`CaptureError::BadMagic`] if the header does not match; I/O errors
    /// otherwise.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let mut inner = BufReader::new(File::open(path.as_ref())?);
        let mut magic = [0u8; 8];
        inner.read_exact(&mut magic)?;
        if &magic != CAPTURE_MAGIC {
            return Err(CaptureError::BadMagic);
        }
        Ok(Self { inner })
    }

    /// Read the next frame, or `None` at a clean end of stream.
    ///
    /// # Errors
    /// A truncated frame or undecodable payload.
    pub fn read_event(&mut self) -> Result<Option<CaptureEvent>, CaptureError> {
        let mut len_bytes = [0u8; 4];
        match self.inner.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut frame = vec![0u8; len];
        self.inner.read_exact(&mut frame)?;
        Ok(Some(serde_json::from_slice(&frame)?))
    }
}

impl Iterator for CaptureReader {
    type Item = Result<CaptureEvent, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event(n: u64) -> CaptureEvent {
        CaptureEvent::new(n * 1000, "test-source", "sample", json!({ "seq": n }))
    }

    #[test]
    fn test_create_refuses_existing_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("capture.tcap");
        std::fs::write(&path, b"pre-existing data").expect("seed file");

        let err = CaptureWriter::create(&path, false, 4096).expect_err("must refuse");
        assert!(matches!(err, CaptureError::TargetExists(_)));

        // The refused open must not have touched the target.
        let contents = std::fs::read(&path).expect("read back");
        assert_eq!(contents, b"pre-existing data");
    }

    #[test]
    fn test_create_with_overwrite_truncates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("capture.tcap");
        std::fs::write(&path, b"stale").expect("seed file");

        let writer = CaptureWriter::create(&path, true, 4096).expect("overwrite");
        writer.flush().expect("flush");

        let contents = std::fs::read(&path).expect("read back");
        assert_eq!(&contents[..8], CAPTURE_MAGIC);
    }

    #[test]
    fn test_events_round_trip_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("capture.tcap");

        let writer = CaptureWriter::create(&path, false, 4096).expect("create");
        for n in 0..5 {
            writer.write(&sample_event(n)).expect("write");
        }
        writer.flush().expect("flush");

        let events: Vec<CaptureEvent> =
            CaptureReader::open(&path).expect("open").collect::<Result<_, _>>().expect("read");
        assert_eq!(events.len(), 5);
        for (n, event) in events.iter().enumerate() {
            assert_eq!(*event, sample_event(n as u64));
        }
    }

    #[test]
    fn test_reader_rejects_foreign_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("not-a-capture");
        std::fs::write(&path, b"plain text, long enough").expect("seed file");

        let err = CaptureReader::open(&path).expect_err("must reject");
        assert!(matches!(err, CaptureError::BadMagic));
    }
}
