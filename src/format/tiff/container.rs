//! TIFF page chain.
//!
//! A TIFF file is a header followed by a linked list of IFDs. OME-TIFF stores
//! one plane per IFD, so the container simply walks the whole chain and keeps
//! every IFD as a [`TiffPage`] in document order.
//!
//! SubIFDs (reduced resolutions in newer OME-TIFF files) hang off individual
//! IFDs and are never part of the main chain, so they are ignored here.

use std::collections::HashSet;

use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::page::TiffPage;
use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs to parse (safety limit)
///
/// OME-TIFF files with a few hundred thousand planes exist, so the limit only
/// guards against corrupt chains that never terminate.
const MAX_IFDS: usize = 1 << 22;

// =============================================================================
// TiffContainer
// =============================================================================

/// A parsed TIFF file: the header and every page of the main IFD chain.
#[derive(Debug, Clone)]
pub struct TiffContainer {
    /// The TIFF header
    pub header: TiffHeader,

    /// Pages in IFD chain order
    pub pages: Vec<TiffPage>,
}

impl TiffContainer {
    /// Parse the header and IFD chain of a TIFF file.
    ///
    /// # Errors
    /// - Header errors (`InvalidMagic`, `InvalidVersion`, ...)
    /// - `InvalidIfdOffset` if the chain points outside the file or loops
    /// - `MissingTag` if a page lacks its dimensions
    pub fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        if header_len < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: reader.size(),
            });
        }
        let header_bytes = reader.read_exact_at(0, header_len)?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header)?;

        let values = ValueReader::new(reader, &header);
        let pages = ifds
            .into_iter()
            .enumerate()
            .map(|(index, ifd)| TiffPage::from_ifd(ifd, index, &values))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            source = reader.identifier(),
            pages = pages.len(),
            bigtiff = header.is_bigtiff,
            byte_order = ?header.byte_order,
            "parsed TIFF container"
        );

        Ok(TiffContainer { header, pages })
    }

    /// Parse all IFDs in the file following the next-IFD chain.
    fn parse_all_ifds<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut visited = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 {
            if !visited.insert(offset) || ifds.len() >= MAX_IFDS {
                return Err(TiffError::InvalidIfdOffset(offset));
            }
            if offset >= reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            // First, read just enough to get the entry count
            let count_size = header.ifd_count_size();
            let count_bytes = reader.read_exact_at(offset, count_size)?;

            let entry_count = header.read_entry_count(&count_bytes);

            let ifd_size = Ifd::calculate_size(entry_count, header)
                .filter(|&size| offset.saturating_add(size as u64) <= reader.size())
                .ok_or(TiffError::InvalidIfdOffset(offset))?;
            let ifd_bytes = reader.read_exact_at(offset, ifd_size)?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    /// Number of pages in the file.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// ImageDescription of the first page, if present.
    pub fn image_description<R: RangeReader>(
        &self,
        reader: &R,
    ) -> Result<Option<String>, TiffError> {
        let Some(first) = self.pages.first() else {
            return Ok(None);
        };
        match first.ifd.get_entry_by_tag(TiffTag::ImageDescription) {
            Some(entry) => self.value_reader(reader).read_string(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Value reader bound to this file's header.
    pub fn value_reader<'a, R: RangeReader>(&'a self, reader: &'a R) -> ValueReader<'a, R> {
        ValueReader::new(reader, &self.header)
    }
}

// =============================================================================
// Tests
// =============================================================================
