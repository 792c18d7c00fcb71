//! TIFF container structure: header, byte order and Image File Directories.
//!
//! OME-TIFF files come in both layouts. Writers switch to BigTIFF once the
//! pixel data passes the 4 GiB offset limit, and files from big-endian
//! acquisition systems still turn up, so every multi-byte read goes through
//! the header's [`ByteOrder`].
//!
//! ```text
//! classic  II|MM  u16 42  u32 first IFD                  8 bytes
//! BigTIFF  II|MM  u16 43  u16 8  u16 0  u64 first IFD    16 bytes
//! ```
//!
//! An IFD is an entry count, that many fixed-size entries and the offset of
//! the next IFD. [`TiffHeader`] knows how wide each of those fields is.

use std::collections::HashMap;

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

/// Version field of a classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version field of a BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order declared by the first two bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    /// Recognize the marker that opens a TIFF file.
    pub fn from_marker(marker: [u8; 2]) -> Option<Self> {
        match &marker {
            b"II" => Some(ByteOrder::LittleEndian),
            b"MM" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// The marker that opens a file in this byte order.
    pub const fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// What the file header tells us before the first IFD is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// 64-bit counts and offsets
    pub is_bigtiff: bool,

    /// Offset of the IFD of page 0
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse the header at the start of a file of `file_size` bytes.
    ///
    /// `bytes` needs 8 bytes for a classic TIFF and 16 for a BigTIFF; the
    /// reserved pair after the BigTIFF offset width is not checked.
    ///
    /// # Errors
    /// - `FileTooSmall` when `bytes` stops inside the header
    /// - `InvalidMagic`, `InvalidVersion` or `InvalidBigTiffOffsetSize` for
    ///   anything that is not a TIFF
    /// - `InvalidIfdOffset` when page 0 would start past the end of the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        require_len(bytes, TIFF_HEADER_SIZE)?;

        let byte_order = ByteOrder::from_marker([bytes[0], bytes[1]])
            .ok_or_else(|| TiffError::InvalidMagic(u16::from_le_bytes([bytes[0], bytes[1]])))?;

        let header = match byte_order.read_u16(&bytes[2..4]) {
            VERSION_TIFF => TiffHeader {
                byte_order,
                is_bigtiff: false,
                first_ifd_offset: byte_order.read_u32(&bytes[4..8]) as u64,
            },
            VERSION_BIGTIFF => {
                require_len(bytes, BIGTIFF_HEADER_SIZE)?;
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                TiffHeader {
                    byte_order,
                    is_bigtiff: true,
                    first_ifd_offset: byte_order.read_u64(&bytes[8..16]),
                }
            }
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if header.first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(header.first_ifd_offset));
        }
        Ok(header)
    }

    #[inline]
    const fn pick(&self, classic: usize, bigtiff: usize) -> usize {
        if self.is_bigtiff {
            bigtiff
        } else {
            classic
        }
    }

    /// Size of one IFD entry: 12 bytes, or 20 in a BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        self.pick(12, 20)
    }

    /// Width of the entry count that opens an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        self.pick(2, 8)
    }

    /// Width of the next-IFD offset that closes an IFD.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        self.pick(4, 8)
    }

    /// Width of the value/offset field of an entry, and so the largest value
    /// that is stored inline.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        self.pick(4, 8)
    }

    /// Read an IFD entry count from the start of `bytes`.
    pub fn read_entry_count(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u16(bytes) as u64
        }
    }

    /// Read a file offset from the start of `bytes`.
    pub fn read_offset(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u32(bytes) as u64
        }
    }
}

fn require_len(bytes: &[u8], required: usize) -> Result<(), TiffError> {
    if bytes.len() < required {
        return Err(TiffError::FileTooSmall {
            required: required as u64,
            actual: bytes.len() as u64,
        });
    }
    Ok(())
}


// =============================================================================
// IfdEntry
// =============================================================================

/// A single 12-byte (TIFF) or 20-byte (BigTIFF) IFD entry.
///
/// The value/offset field is kept as raw bytes: it holds the value itself when
/// it fits inline, otherwise the file offset of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Numeric tag ID
    pub tag_id: u16,

    /// Parsed field type, `None` if the type code is not one we interpret
    pub field_type: Option<FieldType>,

    /// Raw field type code
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// Raw value/offset field (4 bytes used for TIFF, 8 for BigTIFF)
    pub value_offset_bytes: [u8; 8],

    /// Whether the value is stored inline in `value_offset_bytes`
    pub is_inline: bool,

    /// Whether the entry comes from a BigTIFF file (8-byte offsets)
    pub is_bigtiff: bool,
}

impl IfdEntry {
    /// Parse an entry from its raw bytes.
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let byte_order = header.byte_order;
        let tag_id = byte_order.read_u16(&bytes[0..2]);
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (byte_order.read_u64(&bytes[4..12]), 12)
        } else {
            (byte_order.read_u32(&bytes[4..8]) as u64, 8)
        };

        let value_size = header.value_offset_size();
        let mut value_offset_bytes = [0u8; 8];
        value_offset_bytes[..value_size]
            .copy_from_slice(&bytes[value_start..value_start + value_size]);

        // Unknown types are never read, treat them as inline so no fetch happens
        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(true);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
            is_bigtiff: header.is_bigtiff,
        }
    }

    /// The recognized tag, if any.
    #[inline]
    pub fn tag(&self) -> Option<TiffTag> {
        TiffTag::from_u16(self.tag_id)
    }

    /// Total size of the value in bytes.
    ///
    /// `None` for unknown field types and for counts whose size overflows.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .and_then(|ft| (ft.size_in_bytes() as u64).checked_mul(self.count))
    }

    /// Interpret the value/offset field as an offset into the file.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.is_bigtiff {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes[..4]) as u64
        }
    }

    /// Read a single inline Short or Long value.
    ///
    /// Returns `None` if the value is not inline, has a count other than 1,
    /// or is not an unsigned 16/32-bit type.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// Read a single inline Short, Long or Long8 value.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Long8 => Some(byte_order.read_u64(&self.value_offset_bytes)),
            _ => self.inline_u32(byte_order).map(u64::from),
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
///
/// Each page of a TIFF file has one IFD. The entries are kept in file order
/// (which TIFF 6.0 requires to be ascending by tag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Entries of this directory
    pub entries: Vec<IfdEntry>,

    /// Index into `entries` by tag ID
    pub entries_by_tag: HashMap<u16, usize>,

    /// Offset of the next IFD, 0 if this is the last one
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Total size in bytes of an IFD with `entry_count` entries.
    ///
    /// Includes the entry count field, the entries and the next-IFD offset.
    /// Returns `None` when the size does not fit in `usize`.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Option<usize> {
        usize::try_from(entry_count)
            .ok()?
            .checked_mul(header.ifd_entry_size())?
            .checked_add(header.ifd_count_size() + header.ifd_next_offset_size())
    }

    /// Parse an IFD from its raw bytes (starting at the entry count).
    ///
    /// # Errors
    /// - `FileTooSmall` if `bytes` is shorter than the size implied by the
    ///   entry count
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = header.read_entry_count(bytes);

        let total = Self::calculate_size(entry_count, header).ok_or(TiffError::FileTooSmall {
            required: u64::MAX,
            actual: bytes.len() as u64,
        })?;
        if bytes.len() < total {
            return Err(TiffError::FileTooSmall {
                required: total as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let entries: Vec<IfdEntry> = (0..entry_count as usize)
            .map(|i| {
                let start = count_size + i * entry_size;
                IfdEntry::parse(&bytes[start..start + entry_size], header)
            })
            .collect();

        // First occurrence wins if a tag is duplicated
        let mut entries_by_tag = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            entries_by_tag.entry(entry.tag_id).or_insert(i);
        }

        let next_ifd_offset = header.read_offset(&bytes[total - header.ifd_next_offset_size()..]);

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    /// Find the entry for a tag.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag.as_u16())
            .and_then(|&i| self.entries.get(i))
    }

    /// Whether the directory has an entry for a tag.
    #[inline]
    pub fn has_tag(&self, tag: TiffTag) -> bool {
        self.get_entry_by_tag(tag).is_some()
    }

    /// Inline single value of a tag.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    /// Image width in pixels.
    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    /// Image height in pixels.
    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    /// Tile width in pixels, `None` for striped images.
    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    /// Tile height in pixels, `None` for striped images.
    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    /// Raw compression code.
    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    /// Whether the image is organized in tiles.
    pub fn is_tiled(&self) -> bool {
        self.has_tag(TiffTag::TileWidth) && self.has_tag(TiffTag::TileOffsets)
    }
}

// =============================================================================
// Tests
// =============================================================================
