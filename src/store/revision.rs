//! Revision metadata and readers.

use crate::types::RevisionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};

/// Metadata recorded next to every revision blob (`<id>.meta`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    pub revision: RevisionId,
    pub content_type: String,
    pub size: u64,
    /// BLAKE3 digest of the blob, hex encoded
    pub digest: String,
    pub written_at: DateTime<Utc>,
}

/// Streaming reader over one immutable revision.
#[derive(Debug)]
pub struct RevisionReader {
    info: RevisionInfo,
    file: File,
}

impl RevisionReader {
    pub(crate) fn new(info: RevisionInfo, file: File) -> Self {
        Self { info, file }
    }

    pub fn info(&self) -> &RevisionInfo {
        &self.info
    }

    pub fn content_type(&self) -> &str {
        &self.info.content_type
    }

    /// Read the remaining bytes into memory.
    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.info.size as usize);
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for RevisionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}
