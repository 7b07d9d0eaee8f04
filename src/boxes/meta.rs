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

use crate::fourcc::FourCC;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

/// `meta` carries no body of its own beyond the full-box header; its
/// content is the child list on the tree node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetaBox {
    pub version: u8,
    pub flags: u32,
}

impl MetaBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<MetaBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        Ok(MetaBox { version, flags })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerBox {
    pub version: u8,
    pub flags: u32,
    handler_type: FourCC,
    name: String,
}

impl Default for HandlerBox {
    fn default() -> Self {
        HandlerBox {
            version: 0,
            flags: 0,
            handler_type: FourCC::PICT,
            name: String::new(),
        }
    }
}

impl HandlerBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<HandlerBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        // unsigned int(32) pre_defined = 0;
        let pre_defined = stream.read_u32()?;
        if pre_defined != 0 {
            return Err(HeifError::InvalidField("nonzero pre_defined in hdlr".into()));
        }
        // unsigned int(32) handler_type;
        let handler_type = stream.read_fourcc()?;
        // const unsigned int(32)[3] reserved = 0;
        stream.skip(4 * 3)?;
        // string name;
        let name = stream.read_c_string()?;
        Ok(HandlerBox {
            version,
            flags,
            handler_type,
            name,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        // unsigned int(32) pre_defined = 0;
        stream.write_u32(0)?;
        // unsigned int(32) handler_type;
        stream.write_fourcc(self.handler_type)?;
        // const unsigned int(32)[3] reserved = 0;
        stream.write_u32(0)?;
        stream.write_u32(0)?;
        stream.write_u32(0)?;
        // string name;
        stream.write_str_with_nul(&self.name)
    }

    pub fn handler_type(&self) -> FourCC {
        self.handler_type
    }

    pub fn set_handler_type(&mut self, handler_type: FourCC) {
        self.handler_type = handler_type;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.into();
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PrimaryItemBox {
    pub version: u8,
    pub flags: u32,
    item_id: u32,
}

impl PrimaryItemBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<PrimaryItemBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version > 1 {
            return Err(HeifError::UnsupportedVersion(format!("pitm version {version}")));
        }
        let item_id = if version == 0 {
            // unsigned int(16) item_ID;
            stream.read_u16()? as u32
        } else {
            // unsigned int(32) item_ID;
            stream.read_u32()?
        };
        Ok(PrimaryItemBox {
            version,
            flags,
            item_id,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        if self.version == 0 {
            stream.write_u16(u16_from_u32(self.item_id)?)
        } else {
            stream.write_u32(self.item_id)
        }
    }

    pub(crate) fn derive_box_version(&mut self) {
        self.version = if self.item_id > 0xFFFF { 1 } else { 0 };
    }

    pub fn item_id(&self) -> u32 {
        self.item_id
    }

    pub fn set_item_id(&mut self, item_id: u32) {
        self.item_id = item_id;
    }
}

/// `iinf` owns only its full-box header and on-wire entry count; the infe
/// entries live in the generic child list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemInfoBox {
    pub version: u8,
    pub flags: u32,
}

impl ItemInfoBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<(ItemInfoBox, u32)> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version > 1 {
            return Err(HeifError::UnsupportedVersion(format!("iinf version {version}")));
        }
        let entry_count = if version == 0 {
            // unsigned int(16) entry_count;
            stream.read_u16()? as u32
        } else {
            // unsigned int(32) entry_count;
            stream.read_u32()?
        };
        Ok((ItemInfoBox { version, flags }, entry_count))
    }

    pub(crate) fn write(&self, stream: &mut OStream, entry_count: usize) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        if self.version == 0 {
            stream.write_u16(u16_from_usize(entry_count)?)
        } else {
            stream.write_u32(u32_from_usize(entry_count)?)
        }
    }

    pub(crate) fn derive_box_version(&mut self, entry_count: usize) {
        self.version = if entry_count > 0xFFFF { 1 } else { 0 };
    }
}

const INFE_FLAG_HIDDEN: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ItemInfoEntryBox {
    pub version: u8,
    pub flags: u32,
    pub item_id: u32,
    pub item_protection_index: u16,
    pub item_type: FourCC,
    pub item_name: String,
    pub content_type: String,
    pub content_encoding: String,
    pub item_uri_type: String,
}

impl Default for ItemInfoEntryBox {
    fn default() -> Self {
        ItemInfoEntryBox {
            version: 2,
            flags: 0,
            item_id: 0,
            item_protection_index: 0,
            item_type: FourCC::default(),
            item_name: String::new(),
            content_type: String::new(),
            content_encoding: String::new(),
            item_uri_type: String::new(),
        }
    }
}

impl ItemInfoEntryBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ItemInfoEntryBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        // Only the modern layouts are supported.
        if version != 2 && version != 3 {
            return Err(HeifError::UnsupportedVersion(format!("infe version {version}")));
        }
        let item_id = if version == 2 {
            // unsigned int(16) item_ID;
            stream.read_u16()? as u32
        } else {
            // unsigned int(32) item_ID;
            stream.read_u32()?
        };
        // unsigned int(16) item_protection_index;
        let item_protection_index = stream.read_u16()?;
        // unsigned int(32) item_type;
        let item_type = stream.read_fourcc()?;
        let mut entry = ItemInfoEntryBox {
            version,
            flags,
            item_id,
            item_protection_index,
            item_type,
            ..ItemInfoEntryBox::default()
        };
        // utf8string item_name;
        entry.item_name = stream.read_c_string()?;
        if item_type == FourCC::MIME {
            // utf8string content_type;
            entry.content_type = stream.read_c_string()?;
            // utf8string content_encoding; // optional
            if stream.has_bytes_left() {
                entry.content_encoding = stream.read_c_string()?;
            }
        } else if item_type == FourCC::URI {
            // utf8string item_uri_type;
            entry.item_uri_type = stream.read_c_string()?;
        }
        Ok(entry)
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        if self.version == 2 {
            stream.write_u16(u16_from_u32(self.item_id)?)?;
        } else {
            stream.write_u32(self.item_id)?;
        }
        stream.write_u16(self.item_protection_index)?;
        stream.write_fourcc(self.item_type)?;
        stream.write_str_with_nul(&self.item_name)?;
        if self.item_type == FourCC::MIME {
            stream.write_str_with_nul(&self.content_type)?;
            if !self.content_encoding.is_empty() {
                stream.write_str_with_nul(&self.content_encoding)?;
            }
        } else if self.item_type == FourCC::URI {
            stream.write_str_with_nul(&self.item_uri_type)?;
        }
        Ok(())
    }

    pub(crate) fn derive_box_version(&mut self) {
        self.version = if self.item_id > 0xFFFF { 3 } else { 2 };
    }

    pub fn is_hidden_item(&self) -> bool {
        (self.flags & INFE_FLAG_HIDDEN) != 0
    }

    pub fn set_hidden_item(&mut self, hidden: bool) {
        if hidden {
            self.flags |= INFE_FLAG_HIDDEN;
        } else {
            self.flags &= !INFE_FLAG_HIDDEN;
        }
    }
}

/// In-file data blob for construction-method-1 extents.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemDataBox {
    data: Vec<u8>,
}

impl ItemDataBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ItemDataBox> {
        Ok(ItemDataBox {
            data: stream.get_slice(stream.bytes_left())?.to_vec(),
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_slice(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_data(&self, start: u64, length: u64) -> HeifResult<&[u8]> {
        let start = usize_from_u64(start)
            .or(Err(HeifError::OffsetOutOfRange("idat offset does not fit usize".into())))?;
        let length = usize_from_u64(length)
            .or(Err(HeifError::ExtentTooLarge("idat extent does not fit usize".into())))?;
        let end = checked_add!(start, length)
            .or(Err(HeifError::OffsetOutOfRange("idat extent overflow".into())))?;
        if end > self.data.len() {
            return Err(HeifError::OffsetOutOfRange(format!(
                "idat extent [{start}, {end}) outside {} byte payload",
                self.data.len()
            )));
        }
        Ok(&self.data[start..end])
    }

    /// Appends bytes and returns their starting offset within the idat
    /// payload, for recording in a construction-method-1 extent.
    pub fn append_data(&mut self, data: &[u8]) -> u64 {
        let position = self.data.len() as u64;
        self.data.extend_from_slice(data);
        position
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataReferenceBox {
    pub version: u8,
    pub flags: u32,
}

impl DataReferenceBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<(DataReferenceBox, u32)> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        // unsigned int(32) entry_count;
        let entry_count = stream.read_u32()?;
        Ok((DataReferenceBox { version, flags }, entry_count))
    }

    pub(crate) fn write(&self, stream: &mut OStream, entry_count: usize) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_u32(u32_from_usize(entry_count)?)
    }
}

const URL_FLAG_SELF_CONTAINED: u32 = 1;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataEntryUrlBox {
    pub version: u8,
    pub flags: u32,
    pub location: String,
}

impl DataEntryUrlBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<DataEntryUrlBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        let location = if (flags & URL_FLAG_SELF_CONTAINED) != 0 || !stream.has_bytes_left() {
            String::new()
        } else {
            stream.read_c_string()?
        };
        Ok(DataEntryUrlBox {
            version,
            flags,
            location,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        if (self.flags & URL_FLAG_SELF_CONTAINED) == 0 {
            stream.write_str_with_nul(&self.location)?;
        }
        Ok(())
    }

    pub fn is_self_contained(&self) -> bool {
        (self.flags & URL_FLAG_SELF_CONTAINED) != 0
    }
}

/// An entry of the `grpl` container: a full box of any grouping type whose
/// body is a group id plus the grouped entity (item) ids.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityGroupBox {
    pub version: u8,
    pub flags: u32,
    pub group_id: u32,
    pub entity_ids: Vec<u32>,
}

impl EntityGroupBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<EntityGroupBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version != 0 {
            return Err(HeifError::UnsupportedVersion(format!(
                "entity group version {version}"
            )));
        }
        // unsigned int(32) group_id;
        let group_id = stream.read_u32()?;
        // unsigned int(32) num_entities_in_group;
        let num_entities = stream.read_u32()?;
        let mut entity_ids = Vec::new();
        for _ in 0..num_entities {
            // unsigned int(32) entity_id;
            entity_ids.push(stream.read_u32()?);
        }
        Ok(EntityGroupBox {
            version,
            flags,
            group_id,
            entity_ids,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_u32(self.group_id)?;
        stream.write_u32(u32_from_usize(self.entity_ids.len())?)?;
        for entity_id in &self.entity_ids {
            stream.write_u32(*entity_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hdlr_round_trip() {
        let hdlr = HandlerBox::default();
        let mut out = OStream::default();
        hdlr.write(&mut out).unwrap();
        let mut stream = IStream::create(&out.data);
        let parsed = HandlerBox::parse(&mut stream).unwrap();
        assert_eq!(parsed, hdlr);
        assert_eq!(parsed.handler_type(), FourCC::PICT);
    }

    #[test]
    fn infe_strings() {
        let infe = ItemInfoEntryBox {
            item_id: 7,
            item_type: FourCC::MIME,
            item_name: "xmp".into(),
            content_type: "application/rdf+xml".into(),
            ..ItemInfoEntryBox::default()
        };
        let mut out = OStream::default();
        infe.write(&mut out).unwrap();
        let parsed = ItemInfoEntryBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed, infe);
    }

    #[test]
    fn infe_hidden_flag() {
        let mut infe = ItemInfoEntryBox::default();
        assert!(!infe.is_hidden_item());
        infe.set_hidden_item(true);
        assert_eq!(infe.flags, 1);
        infe.set_hidden_item(false);
        assert_eq!(infe.flags, 0);
    }

    #[test]
    fn infe_version_derivation() {
        let mut infe = ItemInfoEntryBox {
            item_id: 65535,
            ..ItemInfoEntryBox::default()
        };
        infe.derive_box_version();
        assert_eq!(infe.version, 2);
        infe.item_id = 65536;
        infe.derive_box_version();
        assert_eq!(infe.version, 3);
    }

    #[test]
    fn idat_extents() {
        let mut idat = ItemDataBox::default();
        assert_eq!(idat.append_data(&[1, 2, 3]), 0);
        assert_eq!(idat.append_data(&[4, 5]), 3);
        assert_eq!(idat.read_data(3, 2), Ok(&[4u8, 5u8][..]));
        assert!(matches!(
            idat.read_data(4, 2),
            Err(HeifError::OffsetOutOfRange(_))
        ));
    }
}
