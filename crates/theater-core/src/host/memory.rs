//! In-memory byte source.

use std::io;

use chrono::{DateTime, Utc};

use super::{BoxFuture, ByteSource};

/// File contents already held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    data: Vec<u8>,
    modified: Option<DateTime<Utc>>,
}

impl MemoryFile {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}

impl ByteSource for MemoryFile {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn read_range<'a>(&'a self, offset: u64, len: usize) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        Box::pin(async move {
            let start = usize::try_from(offset)
                .unwrap_or(usize::MAX)
                .min(self.data.len());
            let end = start.saturating_add(len).min(self.data.len());
            Ok(self.data[start..end].to_vec())
        })
    }
}
