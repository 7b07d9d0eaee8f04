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

use crate::boxes::BmffBox;
use crate::fourcc::FourCC;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAssociation {
    pub essential: bool,
    // 1-based position of a child inside the file's sole ipco box; 0 means
    // no property.
    pub property_index: u16,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IpmaEntry {
    pub item_id: u32,
    pub associations: Vec<PropertyAssociation>,
}

const IPMA_FLAG_WIDE_INDICES: u32 = 1;

#[derive(Debug, Default)]
pub struct ItemPropertyAssociationBox {
    pub version: u8,
    pub flags: u32,
    entries: Vec<IpmaEntry>,
}

impl ItemPropertyAssociationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ItemPropertyAssociationBox> {
        let (version, flags) = stream.read_version_and_flags()?;
        if version > 1 {
            return Err(HeifError::UnsupportedVersion(format!("ipma version {version}")));
        }
        // unsigned int(32) entry_count;
        let entry_count = stream.read_u32()?;
        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let item_id = if version < 1 {
                // unsigned int(16) item_ID;
                stream.read_u16()? as u32
            } else {
                // unsigned int(32) item_ID;
                stream.read_u32()?
            };
            // unsigned int(8) association_count;
            let association_count = stream.read_u8()?;
            let mut associations = Vec::new();
            for _ in 0..association_count {
                // bit(1) essential; unsigned int(7 or 15) property_index;
                let (essential, property_index) = if (flags & IPMA_FLAG_WIDE_INDICES) != 0 {
                    let word = stream.read_u16()?;
                    ((word & 0x8000) != 0, word & 0x7FFF)
                } else {
                    let byte = stream.read_u8()?;
                    ((byte & 0x80) != 0, (byte & 0x7F) as u16)
                };
                associations.push(PropertyAssociation {
                    essential,
                    property_index,
                });
            }
            entries.push(IpmaEntry {
                item_id,
                associations,
            });
        }
        Ok(ItemPropertyAssociationBox {
            version,
            flags,
            entries,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_u32(u32_from_usize(self.entries.len())?)?;
        for entry in &self.entries {
            if self.version < 1 {
                stream.write_u16(u16_from_u32(entry.item_id)?)?;
            } else {
                stream.write_u32(entry.item_id)?;
            }
            stream.write_u8(u8_from_usize(entry.associations.len())?)?;
            for association in &entry.associations {
                if (self.flags & IPMA_FLAG_WIDE_INDICES) != 0 {
                    let mut word = association.property_index & 0x7FFF;
                    if association.essential {
                        word |= 0x8000;
                    }
                    stream.write_u16(word)?;
                } else {
                    if association.property_index > 0x7F {
                        return Err(HeifError::WriterOverflow(
                            "property index needs 15-bit encoding".into(),
                        ));
                    }
                    let mut byte = association.property_index as u8;
                    if association.essential {
                        byte |= 0x80;
                    }
                    stream.write_u8(byte)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn derive_box_version(&mut self) {
        let wide_ids = self.entries.iter().any(|entry| entry.item_id > 0xFFFF);
        self.version = if wide_ids { 1 } else { 0 };
        let wide_indices = self
            .entries
            .iter()
            .any(|entry| entry.associations.iter().any(|a| a.property_index > 0x7F));
        if wide_indices {
            self.flags |= IPMA_FLAG_WIDE_INDICES;
        } else {
            self.flags &= !IPMA_FLAG_WIDE_INDICES;
        }
    }

    pub fn entries(&self) -> &[IpmaEntry] {
        &self.entries
    }

    pub fn associations_for_item(&self, item_id: u32) -> Option<&[PropertyAssociation]> {
        self.entries
            .iter()
            .find(|entry| entry.item_id == item_id)
            .map(|entry| entry.associations.as_slice())
    }

    pub fn add_property_for_item_id(&mut self, item_id: u32, association: PropertyAssociation) {
        match self.entries.iter_mut().find(|entry| entry.item_id == item_id) {
            Some(entry) => entry.associations.push(association),
            None => self.entries.push(IpmaEntry {
                item_id,
                associations: vec![association],
            }),
        }
    }

    pub fn is_property_essential_for_item(&self, item_id: u32, property_index: u16) -> bool {
        self.associations_for_item(item_id)
            .map(|associations| {
                associations
                    .iter()
                    .any(|a| a.property_index == property_index && a.essential)
            })
            .unwrap_or(false)
    }

    /// Concatenates another box's entries, e.g. when combining partial
    /// reads. Duplicate item ids are appended as-is; readers tolerate them.
    pub fn insert_entries_from_other_ipma_box(&mut self, other: &ItemPropertyAssociationBox) {
        self.entries.extend_from_slice(&other.entries);
    }
}

/// The ipco children referenced by `item_id`'s associations, in association
/// order. `ipco` is the property container node of the tree.
pub fn get_properties_for_item<'a>(
    ipco: &'a BmffBox,
    ipma: &ItemPropertyAssociationBox,
    item_id: u32,
) -> HeifResult<Vec<&'a BmffBox>> {
    let mut properties = Vec::new();
    let Some(associations) = ipma.associations_for_item(item_id) else {
        return Ok(properties);
    };
    for association in associations {
        if association.property_index == 0 {
            // Padding entry; associated with nothing.
            continue;
        }
        let index = (association.property_index - 1) as usize;
        let property = ipco.children.get(index).ok_or(HeifError::InvalidField(format!(
            "ipma references ipco child {} of {}",
            association.property_index,
            ipco.children.len()
        )))?;
        properties.push(property);
    }
    Ok(properties)
}

/// The first property of the given type associated with the item.
pub fn get_property_for_item<'a>(
    ipco: &'a BmffBox,
    ipma: &ItemPropertyAssociationBox,
    item_id: u32,
    property_type: FourCC,
) -> HeifResult<Option<&'a BmffBox>> {
    Ok(get_properties_for_item(ipco, ipma, item_id)?
        .into_iter()
        .find(|property| property.box_type == property_type))
}

/// An essential association to a property type outside the recognized set
/// (or to a dangling index) means the item must not be presented.
pub fn has_unrecognized_essential_property(
    ipco: &BmffBox,
    ipma: &ItemPropertyAssociationBox,
    item_id: u32,
) -> bool {
    let Some(associations) = ipma.associations_for_item(item_id) else {
        return false;
    };
    associations.iter().any(|association| {
        if !association.essential || association.property_index == 0 {
            return false;
        }
        match ipco.children.get((association.property_index - 1) as usize) {
            Some(property) => !property.is_recognized(),
            None => true,
        }
    })
}

/// Write-time invariant of the iprp subtree: exactly one ipco child, and
/// every association index resolves to one of its children.
pub fn validate_item_properties(iprp: &BmffBox) -> HeifResult<()> {
    let ipco = iprp.unique_child_by_type(FourCC::IPCO)?;
    let property_count = ipco.children.len();
    for ipma_node in iprp.children_by_type(FourCC::IPMA) {
        let Some(ipma) = ipma_node.as_ipma() else {
            continue;
        };
        for entry in ipma.entries() {
            for association in &entry.associations {
                if association.property_index as usize > property_count {
                    return Err(HeifError::InvalidField(format!(
                        "item {} references property {} but ipco has {}",
                        entry.item_id, association.property_index, property_count
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn association(essential: bool, property_index: u16) -> PropertyAssociation {
        PropertyAssociation {
            essential,
            property_index,
        }
    }

    #[test]
    fn round_trip_narrow_indices() {
        let mut ipma = ItemPropertyAssociationBox::default();
        ipma.add_property_for_item_id(1, association(true, 1));
        ipma.add_property_for_item_id(1, association(false, 2));
        ipma.derive_box_version();
        assert_eq!(ipma.version, 0);
        assert_eq!(ipma.flags, 0);
        let mut out = OStream::default();
        ipma.write(&mut out).unwrap();
        let parsed = ItemPropertyAssociationBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed.entries(), ipma.entries());
        assert!(parsed.is_property_essential_for_item(1, 1));
        assert!(!parsed.is_property_essential_for_item(1, 2));
    }

    #[test]
    fn wide_indices_and_ids() {
        let mut ipma = ItemPropertyAssociationBox::default();
        ipma.add_property_for_item_id(0x1_0000, association(false, 200));
        ipma.derive_box_version();
        assert_eq!(ipma.version, 1);
        assert_eq!(ipma.flags & 1, 1);
        let mut out = OStream::default();
        ipma.write(&mut out).unwrap();
        let parsed = ItemPropertyAssociationBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(
            parsed.associations_for_item(0x1_0000),
            Some(&[association(false, 200)][..])
        );
    }

    #[test]
    fn narrow_write_rejects_wide_index() {
        let mut ipma = ItemPropertyAssociationBox::default();
        ipma.add_property_for_item_id(1, association(false, 200));
        // Without derivation the flag stays narrow and the write must fail
        // rather than truncate the index.
        let mut out = OStream::default();
        assert!(matches!(
            ipma.write(&mut out),
            Err(HeifError::WriterOverflow(_))
        ));
    }

    #[test]
    fn merging_keeps_duplicates() {
        let mut a = ItemPropertyAssociationBox::default();
        a.add_property_for_item_id(1, association(false, 1));
        let mut b = ItemPropertyAssociationBox::default();
        b.add_property_for_item_id(1, association(true, 2));
        a.insert_entries_from_other_ipma_box(&b);
        assert_eq!(a.entries().len(), 2);
        assert_eq!(a.entries()[1].item_id, 1);
    }
}
