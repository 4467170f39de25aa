use holocene::StorageError;
use std::io::{self, Read};
use tempfile::TempDir;

use crate::integration::support::fixture;

/// Yields `good` bytes, then fails.
struct BrokenStream {
    good: usize,
}

impl Read for BrokenStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.good == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream broke"));
        }
        let n = self.good.min(buf.len());
        buf[..n].fill(b'x');
        self.good -= n;
        Ok(n)
    }
}

#[test]
fn failing_stream_leaves_no_revision() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, mut res) = fixture(temp.path());
    res.lock().unwrap();

    let err = res
        .write_and_commit(BrokenStream { good: 200_000 }, Some("text/plain"), &[])
        .unwrap_err();
    assert!(matches!(err, StorageError::IoError(_)));

    assert!(res.revisions().unwrap().is_empty());
    assert_eq!(res.head().unwrap(), None);
    assert_eq!(res.history().iter().unwrap().count(), 0);
    // Only the lock marker remains in the resource directory.
    let names: Vec<String> = std::fs::read_dir(res.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![holocene::lock::LOCK_FILE_NAME.to_string()]);
}

#[test]
fn large_stream_roundtrips_with_metadata() {
    let temp = TempDir::new().unwrap();
    let (_holo, _db, res) = fixture(temp.path());

    let body: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    let revision = res
        .write_stream(io::Cursor::new(body.clone()), "application/octet-stream")
        .unwrap();

    let reader = res.read(&revision).unwrap();
    assert_eq!(reader.info().size, body.len() as u64);
    assert_eq!(reader.content_type(), "application/octet-stream");
    assert_eq!(reader.info().digest, blake3::hash(&body).to_hex().to_string());
    assert_eq!(reader.into_bytes().unwrap(), body);
    assert_eq!(res.store().read_verified(&revision).unwrap(), body);
}
