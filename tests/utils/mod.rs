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

#![allow(dead_code)]

/// A property appended to the test file's ipco: FourCC, raw body, and
/// whether its ipma association is marked essential.
pub struct ExtraProperty {
    pub fourcc: [u8; 4],
    pub body: Vec<u8>,
    pub essential: bool,
}

pub fn wrap(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
    out
}

pub fn wrap_full(fourcc: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut full = vec![version];
    full.extend_from_slice(&flags.to_be_bytes()[1..]);
    full.extend_from_slice(body);
    wrap(fourcc, &full)
}

/// A minimal valid hvcC body: the fixed configuration with the reserved
/// bits set the way the standard requires, and no parameter set arrays.
pub fn hvcc_body() -> Vec<u8> {
    vec![
        1, // configuration_version
        0, // profile_space / tier / profile_idc
        0, 0, 0, 0, // profile compatibility flags
        0, 0, 0, 0, 0, 0, // constraint indicator flags
        93,   // level_idc
        0xF0, 0x00, // reserved + min_spatial_segmentation_idc
        0xFC, // reserved + parallelism_type
        0xFD, // reserved + chroma_format_idc = 1
        0xF8, // reserved + bit_depth_luma_minus8
        0xF8, // reserved + bit_depth_chroma_minus8
        0, 0, // avg_frame_rate
        0x0F, // frame rate / layers / nested / length_size_minus_one = 3
        0,    // num_of_arrays
    ]
}

pub fn ispe_box(width: u32, height: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    wrap_full(b"ispe", 0, 0, &body)
}

/// ftyp(heic, [heic, mif1]) + meta{hdlr, pitm, iloc, iinf, iprp{ipco[hvcC,
/// ispe], ipma}, ...} + mdat(payload). The iloc extent points at the mdat
/// payload with absolute file offsets.
pub fn build_heif(
    payload: &[u8],
    extra_properties: &[ExtraProperty],
    extra_meta_children: &[Vec<u8>],
) -> Vec<u8> {
    let assemble = |mdat_offset: u32| -> Vec<u8> {
        let ftyp = {
            let mut body = Vec::new();
            body.extend_from_slice(b"heic");
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(b"heic");
            body.extend_from_slice(b"mif1");
            wrap(b"ftyp", &body)
        };
        let hdlr = {
            let mut body = Vec::new();
            body.extend_from_slice(&0u32.to_be_bytes());
            body.extend_from_slice(b"pict");
            body.extend_from_slice(&[0; 12]);
            body.push(0);
            wrap_full(b"hdlr", 0, 0, &body)
        };
        let pitm = wrap_full(b"pitm", 0, 0, &1u16.to_be_bytes());
        let iloc = {
            let mut body = vec![0x44, 0x00];
            body.extend_from_slice(&1u16.to_be_bytes()); // item_count
            body.extend_from_slice(&1u16.to_be_bytes()); // item_ID
            body.extend_from_slice(&0u16.to_be_bytes()); // data_reference_index
            body.extend_from_slice(&1u16.to_be_bytes()); // extent_count
            body.extend_from_slice(&mdat_offset.to_be_bytes());
            body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            wrap_full(b"iloc", 0, 0, &body)
        };
        let iinf = {
            let mut infe_body = Vec::new();
            infe_body.extend_from_slice(&1u16.to_be_bytes());
            infe_body.extend_from_slice(&0u16.to_be_bytes());
            infe_body.extend_from_slice(b"hvc1");
            infe_body.push(0);
            let infe = wrap_full(b"infe", 2, 0, &infe_body);
            let mut body = Vec::new();
            body.extend_from_slice(&1u16.to_be_bytes());
            body.extend_from_slice(&infe);
            wrap_full(b"iinf", 0, 0, &body)
        };
        let iprp = {
            let mut ipco_body = Vec::new();
            ipco_body.extend_from_slice(&wrap(b"hvcC", &hvcc_body()));
            ipco_body.extend_from_slice(&ispe_box(64, 64));
            for extra in extra_properties {
                ipco_body.extend_from_slice(&wrap(&extra.fourcc, &extra.body));
            }
            let ipco = wrap(b"ipco", &ipco_body);
            let ipma = {
                let mut body = Vec::new();
                body.extend_from_slice(&1u32.to_be_bytes()); // entry_count
                body.extend_from_slice(&1u16.to_be_bytes()); // item_ID
                body.push(2 + extra_properties.len() as u8); // association_count
                body.push(0x81); // essential, property 1 (hvcC)
                body.push(0x82); // essential, property 2 (ispe)
                for (i, extra) in extra_properties.iter().enumerate() {
                    let index = 3 + i as u8;
                    body.push(if extra.essential { 0x80 | index } else { index });
                }
                wrap_full(b"ipma", 0, 0, &body)
            };
            let mut body = ipco;
            body.extend_from_slice(&ipma);
            wrap(b"iprp", &body)
        };
        let meta = {
            let mut body = Vec::new();
            body.extend_from_slice(&hdlr);
            body.extend_from_slice(&pitm);
            body.extend_from_slice(&iloc);
            body.extend_from_slice(&iinf);
            body.extend_from_slice(&iprp);
            for child in extra_meta_children {
                body.extend_from_slice(child);
            }
            wrap_full(b"meta", 0, 0, &body)
        };
        let mut file = ftyp;
        file.extend_from_slice(&meta);
        file.extend_from_slice(&wrap(b"mdat", payload));
        file
    };
    // Two passes: the mdat payload offset is only known once the metadata
    // size is.
    let first = assemble(0);
    let mdat_payload_offset = (first.len() - payload.len()) as u32;
    assemble(mdat_payload_offset)
}

pub fn minimal_heif(payload: &[u8]) -> Vec<u8> {
    build_heif(payload, &[], &[])
}
