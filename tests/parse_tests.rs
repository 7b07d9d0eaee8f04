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
use crabby_heif::fourcc::FourCC;
use crabby_heif::io::MemoryIO;
use crabby_heif::*;

mod utils;
use utils::*;

#[test]
fn parse_minimal_heif() {
    let payload = vec![0xde, 0xad, 0xbe, 0xef, 0x42];
    let file = utils::minimal_heif(&payload);
    let forest = parse_top_level(&file).unwrap();
    assert!(forest.error.is_none());
    assert!(forest.warnings.is_empty());

    let ftyp = forest.ftyp().unwrap();
    assert_eq!(ftyp.major_brand(), FourCC::new(b"heic"));
    assert_eq!(ftyp.minor_version(), 0);
    assert!(ftyp.has_compatible_brand(FourCC::new(b"mif1")));

    let meta = forest.meta().unwrap();
    let hdlr = meta.child_by_type(FourCC::HDLR).unwrap().as_hdlr().unwrap();
    assert_eq!(hdlr.handler_type(), FourCC::PICT);
    assert_eq!(hdlr.name(), "");
    let pitm = meta.child_by_type(FourCC::PITM).unwrap().as_pitm().unwrap();
    assert_eq!(pitm.item_id(), 1);

    let iinf = meta.child_by_type(FourCC::IINF).unwrap();
    let infes = iinf.children_by_type(FourCC::INFE);
    assert_eq!(infes.len(), 1);
    let infe = infes[0].as_infe().unwrap();
    assert_eq!(infe.item_id, 1);
    assert_eq!(infe.item_type, FourCC::new(b"hvc1"));
    assert!(!infe.is_hidden_item());

    // Property resolution: item 1 resolves to [hvcC, ispe], in order.
    let iprp = meta.child_by_type(FourCC::IPRP).unwrap();
    let ipco = iprp.unique_child_by_type(FourCC::IPCO).unwrap();
    let ipma = iprp.child_by_type(FourCC::IPMA).unwrap().as_ipma().unwrap();
    let properties = get_properties_for_item(ipco, ipma, 1).unwrap();
    assert_eq!(properties.len(), 2);
    assert_eq!(properties[0].box_type, FourCC::HVCC);
    assert_eq!(properties[1].box_type, FourCC::ISPE);
    let ispe = properties[1].as_ispe().unwrap();
    assert_eq!((ispe.width, ispe.height), (64, 64));
    assert!(ipma.is_property_essential_for_item(1, 1));
    assert!(!has_unrecognized_essential_property(ipco, ipma, 1));

    // Items without associations resolve to nothing.
    assert!(get_properties_for_item(ipco, ipma, 2).unwrap().is_empty());

    // Extent resolution returns the mdat payload.
    let iloc = meta.child_by_type(FourCC::ILOC).unwrap().as_iloc().unwrap();
    let mut io = MemoryIO::create(file.clone());
    let mut dest = Vec::new();
    iloc.read_data(1, &mut io, None, &mut dest).unwrap();
    assert_eq!(dest, payload);
}

#[test]
fn truncated_final_box() {
    let file = utils::minimal_heif(&[1, 2, 3, 4]);
    let truncated = &file[..file.len() - 1];
    let forest = parse_top_level(truncated).unwrap();
    // The mdat parse fails structurally; ftyp and meta stay accessible.
    assert!(matches!(forest.error, Some(HeifError::TruncatedBox(_))));
    assert!(forest.ftyp().is_ok());
    let meta = forest.meta().unwrap();
    assert!(meta.child_by_type(FourCC::ILOC).is_some());
}

#[test]
fn unknown_essential_property_refuses_item() {
    let file = build_heif(
        &[1, 2, 3],
        &[ExtraProperty {
            fourcc: *b"zzzz",
            body: vec![1, 2, 3, 4],
            essential: true,
        }],
        &[],
    );
    let forest = parse_top_level(&file).unwrap();
    let meta = forest.meta().unwrap();
    let iprp = meta.child_by_type(FourCC::IPRP).unwrap();
    let ipco = iprp.unique_child_by_type(FourCC::IPCO).unwrap();
    let ipma = iprp.child_by_type(FourCC::IPMA).unwrap().as_ipma().unwrap();
    assert!(!ipco.children[2].is_recognized());
    assert!(has_unrecognized_essential_property(ipco, ipma, 1));
}

#[test]
fn unknown_nonessential_property_is_tolerated() {
    let file = build_heif(
        &[1, 2, 3],
        &[ExtraProperty {
            fourcc: *b"zzzz",
            body: vec![1, 2, 3, 4],
            essential: false,
        }],
        &[],
    );
    let forest = parse_top_level(&file).unwrap();
    let meta = forest.meta().unwrap();
    let iprp = meta.child_by_type(FourCC::IPRP).unwrap();
    let ipco = iprp.unique_child_by_type(FourCC::IPCO).unwrap();
    let ipma = iprp.child_by_type(FourCC::IPMA).unwrap().as_ipma().unwrap();
    assert!(!has_unrecognized_essential_property(ipco, ipma, 1));
    // The unknown property is still returned in association order.
    let properties = get_properties_for_item(ipco, ipma, 1).unwrap();
    assert_eq!(properties.len(), 3);
    assert_eq!(properties[2].box_type, FourCC::new(b"zzzz"));
}

#[test]
fn box_smaller_than_header_is_structural() {
    // Declared size 4 cannot even hold the 8-byte header.
    let mut file = utils::minimal_heif(&[1, 2, 3]);
    file.extend_from_slice(&4u32.to_be_bytes());
    file.extend_from_slice(b"free");
    let forest = parse_top_level(&file).unwrap();
    assert!(matches!(forest.error, Some(HeifError::InvalidBoxSize(_))));
    assert!(forest.meta().is_ok());
}

#[test]
fn first_box_invalid_is_an_error() {
    let mut file = Vec::new();
    file.extend_from_slice(&3u32.to_be_bytes());
    file.extend_from_slice(b"ftyp");
    assert!(parse_top_level(&file).is_err());
}

#[test]
fn unsupported_version_is_skipped_with_warning() {
    // A pitm with version 9 becomes opaque; the rest of meta survives.
    let bad_pitm = wrap_full(b"pitm", 9, 0, &1u32.to_be_bytes());
    let file = build_heif(&[1, 2, 3], &[], &[bad_pitm]);
    let forest = parse_top_level(&file).unwrap();
    assert!(forest.error.is_none());
    assert!(forest
        .warnings
        .iter()
        .any(|w| matches!(w, HeifError::UnsupportedVersion(_))));
    // Two pitm children now: the valid one and the opaque duplicate.
    let meta = forest.meta().unwrap();
    assert!(forest
        .warnings
        .iter()
        .any(|w| matches!(w, HeifError::DuplicateChild(t) if *t == FourCC::PITM)));
    let pitms = meta.children_by_type(FourCC::PITM);
    assert_eq!(pitms.len(), 2);
    assert!(!pitms[1].is_recognized());
    assert!(matches!(
        meta.unique_child_by_type(FourCC::PITM),
        Err(HeifError::DuplicateChild(FourCC::PITM))
    ));
}

#[test]
fn non_printable_fourcc_is_diagnosed() {
    let unknown = wrap(&[0x01, 0x02, 0x03, 0x04], &[0; 4]);
    let mut file = utils::minimal_heif(&[1]);
    file.extend_from_slice(&unknown);
    let forest = parse_top_level(&file).unwrap();
    assert!(forest
        .warnings
        .iter()
        .any(|w| matches!(w, HeifError::InvalidFourCC(_))));
    assert_eq!(forest.boxes.len(), 4);
}

#[test]
fn size_zero_box_extends_to_end_of_file() {
    let mut file = utils::minimal_heif(&[1, 2, 3]);
    let trailer_payload = vec![7u8; 16];
    file.extend_from_slice(&0u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&trailer_payload);
    let forest = parse_top_level(&file).unwrap();
    assert!(forest.error.is_none());
    let last = forest.boxes.last().unwrap();
    assert_eq!(last.box_type, FourCC::MDAT);
    match &last.payload {
        BoxPayload::MediaData(mdat) => assert_eq!(mdat.data, trailer_payload),
        payload => panic!("unexpected payload {payload:?}"),
    }
}
