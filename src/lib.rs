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

#![deny(unsafe_op_in_unsafe_fn)]

pub mod boxes;
pub mod fourcc;
pub mod fraction;
pub mod io;

mod internal_utils;

pub use crate::boxes::{parse_top_level, write_file, BmffBox, BoxForest, BoxPayload};
pub use crate::internal_utils::stream::{IStream, OStream};

use crate::fourcc::FourCC;

use num_derive::FromPrimitive;
use num_traits::cast::FromPrimitive;

/// Error kinds of the box core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeifError {
    InvalidBoxSize(String),
    TruncatedBox(String),
    UnsupportedVersion(String),
    InvalidFourCC(String),
    InvalidField(String),
    MissingRequiredChild(FourCC),
    DuplicateChild(FourCC),
    OffsetOutOfRange(String),
    ExtentTooLarge(String),
    IdatMissing,
    FractionInvalid,
    // Reserved for iref cycle detection.
    CyclicReference,
    WriterOverflow(String),
    IoError(String),
}

pub type HeifResult<T> = Result<T, HeifError>;

impl HeifError {
    /// Structural errors abort the parse of the current tree; everything
    /// else raised inside a box body is recovered by retaining the box
    /// opaquely and skipping to its declared end.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            HeifError::InvalidBoxSize(_) | HeifError::TruncatedBox(_)
        )
    }
}

macro_rules! impl_from_primitive {
    ($from:ty, $from_func: ident, $to: ident, $default: ident) => {
        impl From<$from> for $to {
            fn from(value: $from) -> Self {
                $to::$from_func(value).unwrap_or($to::$default)
            }
        }
    };
}

#[derive(Debug, Default, PartialEq, Copy, Clone, FromPrimitive)]
pub enum ColorPrimaries {
    Unknown = 0,
    Srgb = 1,
    #[default]
    Unspecified = 2,
    Bt470m = 4,
    Bt470bg = 5,
    Bt601 = 6,
    Smpte240 = 7,
    GenericFilm = 8,
    Bt2020 = 9,
    Xyz = 10,
    Smpte431 = 11,
    Smpte432 = 12,
    Ebu3213 = 22,
}

impl_from_primitive!(u16, from_u16, ColorPrimaries, Unspecified);

#[allow(non_upper_case_globals)]
impl ColorPrimaries {
    pub const Bt709: Self = Self::Srgb;
    pub const Bt2100: Self = Self::Bt2020;
    pub const Dci_p3: Self = Self::Smpte432;
}

#[derive(Debug, Default, PartialEq, Copy, Clone, FromPrimitive)]
pub enum TransferCharacteristics {
    Unknown = 0,
    Bt709 = 1,
    #[default]
    Unspecified = 2,
    Bt470m = 4,  // 2.2 gamma
    Bt470bg = 5, // 2.8 gamma
    Bt601 = 6,
    Smpte240 = 7,
    Linear = 8,
    Log100 = 9,
    Log100Sqrt10 = 10,
    Iec61966 = 11,
    Bt1361 = 12,
    Srgb = 13,
    Bt2020_10bit = 14,
    Bt2020_12bit = 15,
    Pq = 16, // Perceptual Quantizer (HDR); BT.2100 PQ
    Smpte428 = 17,
    Hlg = 18, // Hybrid Log-Gamma (HDR); ARIB STD-B67; BT.2100 HLG
}

impl_from_primitive!(u16, from_u16, TransferCharacteristics, Unspecified);

#[allow(non_upper_case_globals)]
impl TransferCharacteristics {
    pub const Smpte2084: Self = Self::Pq;
}

#[derive(Debug, Default, PartialEq, Copy, Clone, FromPrimitive)]
pub enum MatrixCoefficients {
    Identity = 0,
    Bt709 = 1,
    #[default]
    Unspecified = 2,
    Fcc = 4,
    Bt470bg = 5,
    Bt601 = 6,
    Smpte240 = 7,
    Ycgco = 8,
    Bt2020Ncl = 9,
    Bt2020Cl = 10,
    Smpte2085 = 11,
    ChromaDerivedNcl = 12,
    ChromaDerivedCl = 13,
    Ictcp = 14,
    YcgcoRe = 15,
    YcgcoRo = 16,
}

impl_from_primitive!(u16, from_u16, MatrixCoefficients, Unspecified);
