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
use crate::ColorPrimaries;
use crate::HeifError;
use crate::HeifResult;
use crate::MatrixCoefficients;
use crate::TransferCharacteristics;

/// Compact color description. The wire values stay raw u16 so unknown code
/// points round-trip; the typed accessors map them onto the CICP enums.
#[derive(Debug, Clone, PartialEq)]
pub struct NclxColorProfile {
    pub colour_primaries: u16,
    pub transfer_characteristics: u16,
    pub matrix_coefficients: u16,
    pub full_range: bool,
}

impl Default for NclxColorProfile {
    fn default() -> Self {
        NclxColorProfile {
            colour_primaries: 2,
            transfer_characteristics: 2,
            matrix_coefficients: 6,
            full_range: true,
        }
    }
}

impl NclxColorProfile {
    pub fn set_undefined(&mut self) {
        self.colour_primaries = 2;
        self.transfer_characteristics = 2;
        self.matrix_coefficients = 2;
        self.full_range = true;
    }

    pub fn colour_primaries(&self) -> ColorPrimaries {
        self.colour_primaries.into()
    }

    pub fn transfer_characteristics(&self) -> TransferCharacteristics {
        self.transfer_characteristics.into()
    }

    pub fn matrix_coefficients(&self) -> MatrixCoefficients {
        self.matrix_coefficients.into()
    }
}

/// Opaque ICC payload carried under the rICC/prof type codes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColorProfile {
    pub profile_type: FourCC,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorProfile {
    Nclx(NclxColorProfile),
    Raw(RawColorProfile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorInformationBox {
    pub profile: ColorProfile,
}

impl Default for ColorInformationBox {
    fn default() -> Self {
        ColorInformationBox {
            profile: ColorProfile::Nclx(NclxColorProfile::default()),
        }
    }
}

impl ColorInformationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ColorInformationBox> {
        // unsigned int(32) colour_type;
        let colour_type = stream.read_fourcc()?;
        match colour_type {
            FourCC::NCLX => {
                let mut nclx = NclxColorProfile {
                    // unsigned int(16) colour_primaries;
                    colour_primaries: stream.read_u16()?,
                    // unsigned int(16) transfer_characteristics;
                    transfer_characteristics: stream.read_u16()?,
                    // unsigned int(16) matrix_coefficients;
                    matrix_coefficients: stream.read_u16()?,
                    full_range: false,
                };
                // unsigned int(1) full_range_flag; unsigned int(7) reserved;
                let mut bits = stream.sub_bit_stream(1)?;
                nclx.full_range = bits.read_bool()?;
                if bits.read(7)? != 0 {
                    return Err(HeifError::InvalidField(
                        "nonzero reserved bits in nclx".into(),
                    ));
                }
                Ok(ColorInformationBox {
                    profile: ColorProfile::Nclx(nclx),
                })
            }
            // rICC and prof carry ICC payloads; any other type is carried
            // opaquely the same way.
            _ => Ok(ColorInformationBox {
                profile: ColorProfile::Raw(RawColorProfile {
                    profile_type: colour_type,
                    data: stream.get_slice(stream.bytes_left())?.to_vec(),
                }),
            }),
        }
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        match &self.profile {
            ColorProfile::Nclx(nclx) => {
                stream.write_fourcc(FourCC::NCLX)?;
                stream.write_u16(nclx.colour_primaries)?;
                stream.write_u16(nclx.transfer_characteristics)?;
                stream.write_u16(nclx.matrix_coefficients)?;
                stream.write_bool(nclx.full_range)?;
                stream.write_bits(0, 7)?;
            }
            ColorProfile::Raw(raw) => {
                stream.write_fourcc(raw.profile_type)?;
                stream.write_slice(&raw.data)?;
            }
        }
        Ok(())
    }

    pub fn profile_type(&self) -> FourCC {
        match &self.profile {
            ColorProfile::Nclx(_) => FourCC::NCLX,
            ColorProfile::Raw(raw) => raw.profile_type,
        }
    }
}
