// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::boxes::ItemDataBox;
use crate::fourcc::FourCC;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::io::GenericIO;
use crate::HeifError;
use crate::HeifResult;

pub const CONSTRUCTION_METHOD_FILE: u8 = 0;
pub const CONSTRUCTION_METHOD_IDAT: u8 = 1;
pub const CONSTRUCTION_METHOD_ITEM: u8 = 2;

// Allowance for the metadata boxes preceding the mdat payload when bounding
// the final extent offsets before they are known. If the metadata ends up
// larger and an offset no longer fits the reserved width, the patch step
// fails with WriterOverflow instead of corrupting the reservation.
const OFFSET_UPPER_BOUND_SLACK: u64 = 1 << 20;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemLocationExtent {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
    // Bytes queued for emission after the iloc box (construction method 0).
    data: Vec<u8>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemLocationEntry {
    pub item_id: u32,
    pub construction_method: u8,
    pub data_reference_index: u16,
    pub base_offset: u64,
    pub extents: Vec<ItemLocationExtent>,
}

#[derive(Debug, Default)]
pub struct ItemLocationBox {
    pub version: u8,
    pub flags: u32,
    offset_size: u8,
    length_size: u8,
    base_offset_size: u8,
    index_size: u8,
    items: Vec<ItemLocationEntry>,
    user_defined_min_version: u8,
    // Offset of the idat byte that the next construction-method-1 extent
    // will start at. 64-bit: files beyond 2 GiB are in scope.
    idat_cursor: u64,
    // Stream positions of the extent offset fields reserved during write,
    // in extent emission order.
    offset_holes: Vec<usize>,
}

impl ItemLocationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ItemLocationBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version > 2 {
            return Err(HeifError::UnsupportedVersion(format!("iloc version {version}")));
        }
        let mut bits = stream.sub_bit_stream(2)?;
        // unsigned int(4) offset_size;
        let offset_size = bits.read(4)? as u8;
        // unsigned int(4) length_size;
        let length_size = bits.read(4)? as u8;
        // unsigned int(4) base_offset_size;
        let base_offset_size = bits.read(4)? as u8;
        // unsigned int(4) index_size (reserved before version 1);
        let index_nibble = bits.read(4)? as u8;
        let index_size = if version >= 1 { index_nibble } else { 0 };
        for size in [offset_size, length_size, base_offset_size, index_size] {
            if size != 0 && size != 4 && size != 8 {
                return Err(HeifError::InvalidField(format!(
                    "iloc field width {size} not in {{0, 4, 8}}"
                )));
            }
        }
        let item_count = if version < 2 {
            // unsigned int(16) item_count;
            stream.read_u16()? as u32
        } else {
            // unsigned int(32) item_count;
            stream.read_u32()?
        };
        let mut items = Vec::new();
        for _ in 0..item_count {
            let item_id = if version < 2 {
                // unsigned int(16) item_ID;
                stream.read_u16()? as u32
            } else {
                // unsigned int(32) item_ID;
                stream.read_u32()?
            };
            let construction_method = if version >= 1 {
                // unsigned int(12) reserved; unsigned int(4) construction_method;
                let word = stream.read_u16()?;
                let method = (word & 0x0FFF) as u32;
                if method > CONSTRUCTION_METHOD_ITEM as u32 {
                    return Err(HeifError::InvalidField(format!(
                        "iloc construction method {method}"
                    )));
                }
                method as u8
            } else {
                CONSTRUCTION_METHOD_FILE
            };
            // unsigned int(16) data_reference_index;
            let data_reference_index = stream.read_u16()?;
            // unsigned int(base_offset_size*8) base_offset;
            let base_offset = stream.read_uxx(base_offset_size)?;
            // unsigned int(16) extent_count;
            let extent_count = stream.read_u16()?;
            let mut extents = Vec::new();
            for _ in 0..extent_count {
                let index = if version >= 1 && index_size > 0 {
                    // unsigned int(index_size*8) extent_index;
                    stream.read_uxx(index_size)?
                } else {
                    0
                };
                // unsigned int(offset_size*8) extent_offset;
                let offset = stream.read_uxx(offset_size)?;
                // unsigned int(length_size*8) extent_length;
                let length = stream.read_uxx(length_size)?;
                extents.push(ItemLocationExtent {
                    index,
                    offset,
                    length,
                    data: Vec::new(),
                });
            }
            items.push(ItemLocationEntry {
                item_id,
                construction_method,
                data_reference_index,
                base_offset,
                extents,
            });
        }
        Ok(ItemLocationBox {
            version,
            flags,
            offset_size,
            length_size,
            base_offset_size,
            index_size,
            items,
            ..ItemLocationBox::default()
        })
    }

    /// Emits the iloc body, reserving the offset field of every extent
    /// whose data is queued for emission after this box.
    pub(crate) fn write(&mut self, stream: &mut OStream) -> HeifResult<()> {
        self.offset_holes.clear();
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        // unsigned int(4) offset_size; unsigned int(4) length_size;
        stream.write_u8((self.offset_size << 4) | self.length_size)?;
        // unsigned int(4) base_offset_size; unsigned int(4) index_size/reserved;
        let index_nibble = if self.version >= 1 { self.index_size } else { 0 };
        stream.write_u8((self.base_offset_size << 4) | index_nibble)?;
        if self.version < 2 {
            stream.write_u16(u16_from_usize(self.items.len())?)?;
        } else {
            stream.write_u32(u32_from_usize(self.items.len())?)?;
        }
        for item in &self.items {
            if self.version < 2 {
                stream.write_u16(u16_from_u32(item.item_id)?)?;
            } else {
                stream.write_u32(item.item_id)?;
            }
            if self.version >= 1 {
                // unsigned int(12) reserved; unsigned int(4) construction_method;
                stream.write_u16(item.construction_method as u16)?;
            }
            stream.write_u16(item.data_reference_index)?;
            stream.write_uxx(item.base_offset, self.base_offset_size)?;
            stream.write_u16(u16_from_usize(item.extents.len())?)?;
            for extent in &item.extents {
                if self.version >= 1 && self.index_size > 0 {
                    stream.write_uxx(extent.index, self.index_size)?;
                }
                if Self::is_queued(item, extent) {
                    // The final absolute position is only known once the
                    // data lands after this box; reserve the field.
                    self.offset_holes.push(stream.offset());
                    stream.write_uxx(0, self.offset_size)?;
                } else {
                    stream.write_uxx(extent.offset, self.offset_size)?;
                }
                stream.write_uxx(extent.length, self.length_size)?;
            }
        }
        Ok(())
    }

    fn is_queued(item: &ItemLocationEntry, extent: &ItemLocationExtent) -> bool {
        item.construction_method == CONSTRUCTION_METHOD_FILE && !extent.data.is_empty()
    }

    pub fn has_queued_data(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.extents.iter().any(|extent| Self::is_queued(item, extent)))
    }

    /// Appends the queued media payload as an mdat box and patches the
    /// reserved extent offset fields with the final absolute positions.
    pub fn write_mdat_after_iloc(&mut self, stream: &mut OStream) -> HeifResult<()> {
        stream.start_box(FourCC::MDAT)?;
        let mut holes = self.offset_holes.iter();
        let offset_size = self.offset_size;
        for item in &mut self.items {
            for extent in &mut item.extents {
                if item.construction_method != CONSTRUCTION_METHOD_FILE || extent.data.is_empty() {
                    continue;
                }
                let position = u64_from_usize(stream.offset())?;
                let hole = *holes.next().ok_or(HeifError::WriterOverflow(
                    "extent data queued after the iloc box was written".into(),
                ))?;
                stream.write_slice(&extent.data)?;
                match offset_size {
                    4 => {
                        let narrow = u32_from_u64(position).or(Err(HeifError::WriterOverflow(
                            format!("extent offset {position} does not fit 32 bits"),
                        )))?;
                        stream.write_u32_at_offset(narrow, hole)?;
                    }
                    8 => stream.write_u64_at_offset(position, hole)?,
                    _ => {
                        return Err(HeifError::WriterOverflow(
                            "no offset field reserved for queued extent".into(),
                        ))
                    }
                }
                extent.offset = position;
            }
        }
        self.offset_holes.clear();
        stream.finish_box()
    }

    pub fn items(&self) -> &[ItemLocationEntry] {
        &self.items
    }

    pub fn item_by_id(&self, item_id: u32) -> Option<&ItemLocationEntry> {
        self.items.iter().find(|item| item.item_id == item_id)
    }

    /// The caller may pin a minimum version (e.g. to keep a file layout
    /// stable across rewrites); derivation never goes below it.
    pub fn set_min_version(&mut self, min_version: u8) {
        self.user_defined_min_version = min_version;
    }

    pub fn add_item(&mut self, entry: ItemLocationEntry) {
        self.items.push(entry);
    }

    /// Queues payload bytes for an item. Construction method 0 defers the
    /// extent offset until `write_mdat_after_iloc`; method 1 assigns the
    /// next idat-relative offset immediately (the same bytes must be
    /// appended to the file's idat box).
    pub fn append_data(
        &mut self,
        item_id: u32,
        data: Vec<u8>,
        construction_method: u8,
    ) -> HeifResult<()> {
        if construction_method > CONSTRUCTION_METHOD_IDAT {
            return Err(HeifError::InvalidField(format!(
                "cannot queue data for construction method {construction_method}"
            )));
        }
        let index = match self.items.iter().position(|item| item.item_id == item_id) {
            Some(index) => {
                if self.items[index].construction_method != construction_method {
                    return Err(HeifError::InvalidField(
                        "item uses a different construction method".into(),
                    ));
                }
                index
            }
            None => {
                self.items.push(ItemLocationEntry {
                    item_id,
                    construction_method,
                    ..ItemLocationEntry::default()
                });
                self.items.len() - 1
            }
        };
        let length = u64_from_usize(data.len())?;
        let extent = if construction_method == CONSTRUCTION_METHOD_IDAT {
            let offset = self.idat_cursor;
            checked_incr!(self.idat_cursor, length);
            ItemLocationExtent {
                index: 0,
                offset,
                length,
                data: Vec::new(),
            }
        } else {
            ItemLocationExtent {
                index: 0,
                offset: 0,
                length,
                data,
            }
        };
        self.items[index].extents.push(extent);
        Ok(())
    }

    /// Resolves an item's payload by concatenating its extents, reading
    /// from the primary stream or the file's idat box depending on the
    /// construction method.
    pub fn read_data(
        &self,
        item_id: u32,
        io: &mut dyn GenericIO,
        idat: Option<&ItemDataBox>,
        dest: &mut Vec<u8>,
    ) -> HeifResult<()> {
        let item = self.item_by_id(item_id).ok_or(HeifError::InvalidField(format!(
            "item {item_id} has no iloc entry"
        )))?;
        for extent in &item.extents {
            match item.construction_method {
                CONSTRUCTION_METHOD_FILE => {
                    if extent.length > io.size_hint() {
                        return Err(HeifError::ExtentTooLarge(format!(
                            "extent of {} bytes exceeds the {} byte stream",
                            extent.length,
                            io.size_hint()
                        )));
                    }
                    let position = item
                        .base_offset
                        .checked_add(extent.offset)
                        .ok_or(HeifError::OffsetOutOfRange("extent offset overflow".into()))?;
                    let length = usize_from_u64(extent.length)
                        .or(Err(HeifError::ExtentTooLarge("extent does not fit usize".into())))?;
                    dest.extend_from_slice(io.read_exact(position, length)?);
                }
                CONSTRUCTION_METHOD_IDAT => {
                    let idat = idat.ok_or(HeifError::IdatMissing)?;
                    let start = item
                        .base_offset
                        .checked_add(extent.offset)
                        .ok_or(HeifError::OffsetOutOfRange("extent offset overflow".into()))?;
                    dest.extend_from_slice(idat.read_data(start, extent.length)?);
                }
                _ => {
                    return Err(HeifError::InvalidField(
                        "construction method 2 requires item indirection".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Picks the version and field widths. The offset width for queued
    /// extents is chosen by upper-bounding the final positions with the
    /// queued payload total plus a metadata allowance; `write_mdat_after_iloc`
    /// verifies the bound held.
    pub(crate) fn derive_box_version(&mut self) {
        let mut version = self.user_defined_min_version;
        let wide_ids =
            self.items.len() > 0xFFFF || self.items.iter().any(|item| item.item_id > 0xFFFF);
        let uses_construction_method = self
            .items
            .iter()
            .any(|item| item.construction_method != CONSTRUCTION_METHOD_FILE);
        let uses_extent_index = self
            .items
            .iter()
            .any(|item| item.extents.iter().any(|extent| extent.index != 0));
        if wide_ids {
            version = version.max(2);
        } else if uses_construction_method || uses_extent_index {
            version = version.max(1);
        }
        self.version = version;

        let mut max_known_offset: u64 = 0;
        let mut max_length: u64 = 0;
        let mut max_base_offset: u64 = 0;
        let mut max_index: u64 = 0;
        let mut queued_total: u64 = 0;
        for item in &self.items {
            max_base_offset = max_base_offset.max(item.base_offset);
            for extent in &item.extents {
                max_length = max_length.max(extent.length);
                max_index = max_index.max(extent.index);
                if Self::is_queued(item, extent) {
                    queued_total = queued_total.saturating_add(extent.length);
                } else {
                    max_known_offset = max_known_offset.max(extent.offset);
                }
            }
        }
        let offset_bound =
            max_known_offset.max(queued_total.saturating_add(OFFSET_UPPER_BOUND_SLACK));
        self.offset_size = width_for(offset_bound);
        self.length_size = width_for(max_length);
        self.base_offset_size = if max_base_offset == 0 { 0 } else { width_for(max_base_offset) };
        self.index_size = if self.version >= 1 && max_index != 0 { width_for(max_index) } else { 0 };
    }
}

fn width_for(value: u64) -> u8 {
    if value > u32::MAX as u64 {
        8
    } else {
        4
    }
}
