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

use crate::boxes::BoxHeader;
use crate::boxes::BoxSize;
use crate::fourcc::FourCC;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

/// A typed directed edge set: `from_item_id` is a `reference_type` for each
/// of `to_item_ids` (dimg points the other way).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ItemReferenceEntry {
    pub reference_type: FourCC,
    pub from_item_id: u32,
    pub to_item_ids: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct ItemReferenceBox {
    pub version: u8,
    pub flags: u32,
    references: Vec<ItemReferenceEntry>,
}

impl ItemReferenceBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ItemReferenceBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version > 1 {
            return Err(HeifError::UnsupportedVersion(format!("iref version {version}")));
        }
        let mut references = Vec::new();
        // The reference records are nested boxes typed by the reference
        // FourCC.
        while stream.has_bytes_left() {
            let header = BoxHeader::parse(stream)?;
            let body_size = match header.size {
                BoxSize::FixedSize(size) => size,
                BoxSize::UntilEndOfStream => stream.bytes_left(),
            };
            let mut record = stream.sub_stream(body_size)?;
            let from_item_id = if version == 0 {
                // unsigned int(16) from_item_ID;
                record.read_u16()? as u32
            } else {
                // unsigned int(32) from_item_ID;
                record.read_u32()?
            };
            // unsigned int(16) reference_count;
            let reference_count = record.read_u16()?;
            let mut to_item_ids = Vec::new();
            for _ in 0..reference_count {
                let to_item_id = if version == 0 {
                    // unsigned int(16) to_item_ID;
                    record.read_u16()? as u32
                } else {
                    // unsigned int(32) to_item_ID;
                    record.read_u32()?
                };
                to_item_ids.push(to_item_id);
            }
            references.push(ItemReferenceEntry {
                reference_type: header.box_type,
                from_item_id,
                to_item_ids,
            });
        }
        Ok(ItemReferenceBox {
            version,
            flags,
            references,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        for reference in &self.references {
            stream.start_box(reference.reference_type)?;
            if self.version == 0 {
                stream.write_u16(u16_from_u32(reference.from_item_id)?)?;
            } else {
                stream.write_u32(reference.from_item_id)?;
            }
            stream.write_u16(u16_from_usize(reference.to_item_ids.len())?)?;
            for to_item_id in &reference.to_item_ids {
                if self.version == 0 {
                    stream.write_u16(u16_from_u32(*to_item_id)?)?;
                } else {
                    stream.write_u32(*to_item_id)?;
                }
            }
            stream.finish_box()?;
        }
        Ok(())
    }

    pub(crate) fn derive_box_version(&mut self) {
        let wide = self.references.iter().any(|r| {
            r.from_item_id > 0xFFFF || r.to_item_ids.iter().any(|id| *id > 0xFFFF)
        });
        self.version = if wide { 1 } else { 0 };
    }

    pub fn references(&self) -> &[ItemReferenceEntry] {
        &self.references
    }

    pub fn has_references(&self, item_id: u32) -> bool {
        self.references.iter().any(|r| r.from_item_id == item_id)
    }

    /// The targets of the first reference of the given type from `item_id`.
    pub fn get_references(&self, item_id: u32, reference_type: FourCC) -> &[u32] {
        self.references
            .iter()
            .find(|r| r.from_item_id == item_id && r.reference_type == reference_type)
            .map(|r| r.to_item_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_references_from(&self, item_id: u32) -> Vec<&ItemReferenceEntry> {
        self.references
            .iter()
            .filter(|r| r.from_item_id == item_id)
            .collect()
    }

    pub fn add_reference(&mut self, from_item_id: u32, reference_type: FourCC, to_item_ids: Vec<u32>) {
        self.references.push(ItemReferenceEntry {
            reference_type,
            from_item_id,
            to_item_ids,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let mut iref = ItemReferenceBox::default();
        iref.add_reference(2, FourCC::THMB, vec![1]);
        iref.add_reference(3, FourCC::AUXL, vec![1, 2]);
        assert!(iref.has_references(2));
        assert!(!iref.has_references(1));
        assert_eq!(iref.get_references(2, FourCC::THMB), &[1]);
        assert_eq!(iref.get_references(2, FourCC::AUXL), &[] as &[u32]);
        assert_eq!(iref.get_references_from(3).len(), 1);
    }

    #[test]
    fn round_trip() {
        let mut iref = ItemReferenceBox::default();
        iref.add_reference(2, FourCC::THMB, vec![1]);
        iref.derive_box_version();
        assert_eq!(iref.version, 0);
        let mut out = OStream::default();
        iref.write(&mut out).unwrap();
        let parsed = ItemReferenceBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed.references(), iref.references());
    }

    #[test]
    fn wide_ids_select_version_1() {
        let mut iref = ItemReferenceBox::default();
        iref.add_reference(2, FourCC::DIMG, vec![0x1_0000]);
        iref.derive_box_version();
        assert_eq!(iref.version, 1);
        let mut out = OStream::default();
        iref.write(&mut out).unwrap();
        let parsed = ItemReferenceBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed.get_references(2, FourCC::DIMG), &[0x1_0000]);
    }
}
