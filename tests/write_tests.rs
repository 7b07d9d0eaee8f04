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

use crabby_heif::boxes::iprp::*;
use crabby_heif::boxes::*;
use crabby_heif::fourcc::FourCC;
use crabby_heif::io::GenericIO;
use crabby_heif::io::MemoryIO;
use crabby_heif::*;

mod utils;

fn ftyp_node() -> BmffBox {
    let mut ftyp = FileTypeBox::new(FourCC::new(b"heic"), 0);
    ftyp.add_compatible_brand(FourCC::new(b"heic"));
    ftyp.add_compatible_brand(FourCC::new(b"mif1"));
    BmffBox::new(FourCC::FTYP, BoxPayload::FileType(ftyp))
}

fn infe_node(item_id: u32, item_type: &[u8; 4]) -> BmffBox {
    BmffBox::new(
        FourCC::INFE,
        BoxPayload::ItemInfoEntry(ItemInfoEntryBox {
            item_id,
            item_type: FourCC::new(item_type),
            ..ItemInfoEntryBox::default()
        }),
    )
}

/// Builds a one-item HEIF through the box tree and the two-pass writer.
fn build_forest(image_data: Vec<u8>, use_idat: bool) -> BoxForest {
    let mut forest = BoxForest::default();
    forest.boxes.push(ftyp_node());

    let mut meta = BmffBox::container(FourCC::META);
    meta.append_child_box(BmffBox::new(
        FourCC::HDLR,
        BoxPayload::Handler(HandlerBox::default()),
    ));
    let mut pitm = PrimaryItemBox::default();
    pitm.set_item_id(1);
    meta.append_child_box(BmffBox::new(FourCC::PITM, BoxPayload::PrimaryItem(pitm)));

    let mut iloc = ItemLocationBox::default();
    let mut idat = ItemDataBox::default();
    if use_idat {
        iloc.append_data(1, image_data.clone(), CONSTRUCTION_METHOD_IDAT)
            .unwrap();
        idat.append_data(&image_data);
    } else {
        iloc.append_data(1, image_data, CONSTRUCTION_METHOD_FILE)
            .unwrap();
    }
    meta.append_child_box(BmffBox::new(FourCC::ILOC, BoxPayload::ItemLocation(iloc)));

    let mut iinf = BmffBox::container(FourCC::IINF);
    iinf.append_child_box(infe_node(1, b"hvc1"));
    meta.append_child_box(iinf);

    let mut iprp = BmffBox::container(FourCC::IPRP);
    let mut ipco = BmffBox::container(FourCC::IPCO);
    let mut hvcc = HevcConfigurationBox::default();
    hvcc.append_nal_data(&[32 << 1, 0x11]).unwrap();
    hvcc.append_nal_data(&[33 << 1, 0x22]).unwrap();
    hvcc.append_nal_data(&[34 << 1, 0x33]).unwrap();
    ipco.append_child_box(BmffBox::new(
        FourCC::HVCC,
        BoxPayload::HevcConfiguration(hvcc),
    ));
    ipco.append_child_box(BmffBox::new(
        FourCC::ISPE,
        BoxPayload::ImageSpatialExtents(ImageSpatialExtentsBox {
            width: 64,
            height: 64,
            ..ImageSpatialExtentsBox::default()
        }),
    ));
    iprp.append_child_box(ipco);
    let mut ipma = ItemPropertyAssociationBox::default();
    ipma.add_property_for_item_id(
        1,
        PropertyAssociation {
            essential: true,
            property_index: 1,
        },
    );
    ipma.add_property_for_item_id(
        1,
        PropertyAssociation {
            essential: false,
            property_index: 2,
        },
    );
    iprp.append_child_box(BmffBox::new(
        FourCC::IPMA,
        BoxPayload::ItemPropertyAssociation(ipma),
    ));
    meta.append_child_box(iprp);

    if use_idat {
        meta.append_child_box(BmffBox::new(FourCC::IDAT, BoxPayload::ItemData(idat)));
    }
    forest.boxes.push(meta);
    forest
}

#[test]
fn two_pass_writer_emits_readable_file() {
    let image_data = vec![0x5A; 300];
    let mut forest = build_forest(image_data.clone(), false);
    let mut out = OStream::default();
    write_file(&mut out, &mut forest).unwrap();

    let reparsed = parse_top_level(&out.data).unwrap();
    assert!(reparsed.error.is_none());
    assert!(reparsed.warnings.is_empty());
    // The queued payload landed in an mdat after the metadata.
    let mdat = reparsed.boxes.last().unwrap();
    assert_eq!(mdat.box_type, FourCC::MDAT);

    let meta = reparsed.meta().unwrap();
    let iloc = meta.child_by_type(FourCC::ILOC).unwrap().as_iloc().unwrap();
    let entry = iloc.item_by_id(1).unwrap();
    assert_eq!(entry.extents.len(), 1);
    assert_eq!(entry.extents[0].length, 300);
    // The patched offset points into the mdat body.
    assert!(entry.extents[0].offset >= (out.data.len() - 300) as u64);

    let mut io = MemoryIO::create(out.data.clone());
    let mut dest = Vec::new();
    iloc.read_data(1, &mut io, None, &mut dest).unwrap();
    assert_eq!(dest, image_data);

    // Property machinery survives the round trip.
    let iprp = meta.child_by_type(FourCC::IPRP).unwrap();
    let ipco = iprp.unique_child_by_type(FourCC::IPCO).unwrap();
    let ipma = iprp.child_by_type(FourCC::IPMA).unwrap().as_ipma().unwrap();
    let properties = get_properties_for_item(ipco, ipma, 1).unwrap();
    assert_eq!(properties.len(), 2);
    let hvcc = properties[0].as_hvcc().unwrap();
    let mut headers = Vec::new();
    hvcc.get_headers(&mut headers);
    assert_eq!(
        headers,
        vec![0, 0, 0, 2, 64, 0x11, 0, 0, 0, 2, 66, 0x22, 0, 0, 0, 2, 68, 0x33]
    );
}

#[test]
fn written_file_round_trips_byte_exactly() {
    let mut forest = build_forest(vec![0x77; 64], false);
    let mut out = OStream::default();
    write_file(&mut out, &mut forest).unwrap();
    // A writer-produced file re-parses and re-writes to the same bytes.
    let mut reparsed = parse_top_level(&out.data).unwrap();
    let mut again = OStream::default();
    write_file(&mut again, &mut reparsed).unwrap();
    assert_eq!(again.data, out.data);
}

#[test]
fn idat_construction_method_round_trips() {
    let image_data = vec![0xA5; 40];
    let mut forest = build_forest(image_data.clone(), true);
    let mut out = OStream::default();
    write_file(&mut out, &mut forest).unwrap();

    let reparsed = parse_top_level(&out.data).unwrap();
    // No mdat: the payload lives in the meta-level idat.
    assert!(reparsed.boxes.iter().all(|b| b.box_type != FourCC::MDAT));
    let meta = reparsed.meta().unwrap();
    let iloc = meta.child_by_type(FourCC::ILOC).unwrap().as_iloc().unwrap();
    let idat = meta.child_by_type(FourCC::IDAT).unwrap().as_idat().unwrap();
    let entry = iloc.item_by_id(1).unwrap();
    assert_eq!(entry.construction_method, CONSTRUCTION_METHOD_IDAT);
    // iloc is version 1 because a construction method is in use.
    assert_eq!(iloc.version, 1);

    let mut io = MemoryIO::create(out.data.clone());
    let mut dest = Vec::new();
    iloc.read_data(1, &mut io, Some(idat), &mut dest).unwrap();
    assert_eq!(dest, image_data);
}

#[test]
fn dangling_property_association_fails_write() {
    let mut forest = build_forest(vec![1, 2, 3], false);
    let meta = forest.child_by_type_mut(FourCC::META).unwrap();
    let iprp = meta.child_by_type_mut(FourCC::IPRP).unwrap();
    let ipma = iprp
        .child_by_type_mut(FourCC::IPMA)
        .unwrap()
        .as_ipma_mut()
        .unwrap();
    ipma.add_property_for_item_id(
        1,
        PropertyAssociation {
            essential: false,
            property_index: 9,
        },
    );
    let mut out = OStream::default();
    assert!(matches!(
        write_file(&mut out, &mut forest),
        Err(HeifError::InvalidField(_))
    ));
}

#[test]
fn file_io_resolves_extents() {
    use std::io::Write;

    let image_data = vec![0x3C; 128];
    let mut forest = build_forest(image_data.clone(), false);
    let mut out = OStream::default();
    write_file(&mut out, &mut forest).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&out.data).unwrap();
    file.flush().unwrap();
    let mut io = io::FileIO::create(file.path().to_str().unwrap()).unwrap();
    assert_eq!(io.size_hint(), out.data.len() as u64);

    let reparsed = parse_top_level(&out.data).unwrap();
    let meta = reparsed.meta().unwrap();
    let iloc = meta.child_by_type(FourCC::ILOC).unwrap().as_iloc().unwrap();
    let mut dest = Vec::new();
    iloc.read_data(1, &mut io, None, &mut dest).unwrap();
    assert_eq!(dest, image_data);
}

#[test]
fn forest_level_writer_preserves_unqueued_iloc() {
    // A forest with no queued data must not grow an mdat.
    let file = utils::minimal_heif(&[1, 2, 3]);
    let mut forest = parse_top_level(&file).unwrap();
    let mut out = OStream::default();
    write_file(&mut out, &mut forest).unwrap();
    let mdat_count = parse_top_level(&out.data)
        .unwrap()
        .boxes
        .iter()
        .filter(|b| b.box_type == FourCC::MDAT)
        .count();
    assert_eq!(mdat_count, 1);
}
