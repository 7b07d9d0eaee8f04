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

use std::fmt;

/// Four-character code identifying a box type or brand.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const META: Self = Self(*b"meta");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const PITM: Self = Self(*b"pitm");
    pub const ILOC: Self = Self(*b"iloc");
    pub const IINF: Self = Self(*b"iinf");
    pub const INFE: Self = Self(*b"infe");
    pub const IREF: Self = Self(*b"iref");
    pub const IPRP: Self = Self(*b"iprp");
    pub const IPCO: Self = Self(*b"ipco");
    pub const IPMA: Self = Self(*b"ipma");
    pub const ISPE: Self = Self(*b"ispe");
    pub const PASP: Self = Self(*b"pasp");
    pub const PIXI: Self = Self(*b"pixi");
    pub const IROT: Self = Self(*b"irot");
    pub const IMIR: Self = Self(*b"imir");
    pub const AUXC: Self = Self(*b"auxC");
    pub const CLAP: Self = Self(*b"clap");
    pub const LSEL: Self = Self(*b"lsel");
    pub const A1OP: Self = Self(*b"a1op");
    pub const A1LX: Self = Self(*b"a1lx");
    pub const CLLI: Self = Self(*b"clli");
    pub const MDCV: Self = Self(*b"mdcv");
    pub const UDES: Self = Self(*b"udes");
    pub const HVCC: Self = Self(*b"hvcC");
    pub const AV1C: Self = Self(*b"av1C");
    pub const VVCC: Self = Self(*b"vvcC");
    pub const COLR: Self = Self(*b"colr");
    pub const IDAT: Self = Self(*b"idat");
    pub const GRPL: Self = Self(*b"grpl");
    pub const DINF: Self = Self(*b"dinf");
    pub const DREF: Self = Self(*b"dref");
    pub const URL: Self = Self(*b"url ");
    pub const MDAT: Self = Self(*b"mdat");
    pub const UUID: Self = Self(*b"uuid");

    // Color profile types carried inside colr.
    pub const NCLX: Self = Self(*b"nclx");
    pub const RICC: Self = Self(*b"rICC");
    pub const PROF: Self = Self(*b"prof");

    // Handler and item types.
    pub const PICT: Self = Self(*b"pict");
    pub const URI: Self = Self(*b"uri ");
    pub const MIME: Self = Self(*b"mime");

    // Reference types.
    pub const THMB: Self = Self(*b"thmb");
    pub const AUXL: Self = Self(*b"auxl");
    pub const CDSC: Self = Self(*b"cdsc");
    pub const DIMG: Self = Self(*b"dimg");
    pub const PREM: Self = Self(*b"prem");

    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// A legal code is printable ASCII (space allowed, as in "url ").
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|&b| (0x20..0x7f).contains(&b))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(code: [u8; 4]) -> Self {
        Self(code)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            write!(f, "{}", self.as_str())
        } else {
            write!(
                f,
                "0x{:02x}{:02x}{:02x}{:02x}",
                self.0[0], self.0[1], self.0[2], self.0[3]
            )
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
