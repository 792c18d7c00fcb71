use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use super::range_reader::check_range;
use super::RangeReader;
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file handle is owned by the reader and closed when the reader is
/// dropped. The file size is taken once on open.
#[derive(Debug)]
pub struct FileRangeReader {
    file: File,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open a file for range reads.
    ///
    /// Returns `IoError::NotFound` if the file does not exist and
    /// `IoError::Read` for any other failure to open or stat it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                IoError::NotFound(identifier.clone())
            } else {
                IoError::Read {
                    path: identifier.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::Read {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Self {
            file,
            size,
            identifier,
        })
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        let read_error = |e: std::io::Error| IoError::Read {
            path: self.identifier.clone(),
            message: e.to_string(),
        };

        // `&File` implements Read + Seek, so no interior mutability is needed
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset)).map_err(read_error)?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(read_error)?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// In-memory implementation of RangeReader.
///
/// Useful for files that were already fetched or generated in memory.
#[derive(Debug, Clone)]
pub struct BytesRangeReader {
    data: Bytes,
    identifier: String,
}

impl BytesRangeReader {
    /// Wrap a buffer, using `identifier` in log and error messages.
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

impl RangeReader for BytesRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size())?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
