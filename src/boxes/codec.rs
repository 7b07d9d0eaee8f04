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

use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

/// One array of parameter-set NAL units (VPS/SPS/PPS for HEVC, APS/... for
/// VVC), as stored in the configuration record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NalArray {
    pub array_completeness: bool,
    pub nal_unit_type: u8,
    pub nal_units: Vec<Vec<u8>>,
}

fn parse_nal_units(stream: &mut IStream) -> HeifResult<Vec<Vec<u8>>> {
    // unsigned int(16) num_nalus;
    let num_nalus = stream.read_u16()?;
    let mut nal_units = Vec::new();
    for _ in 0..num_nalus {
        // unsigned int(16) nal_unit_length;
        let length = stream.read_u16()? as usize;
        nal_units.push(stream.get_slice(length)?.to_vec());
    }
    Ok(nal_units)
}

fn write_nal_units(stream: &mut OStream, nal_units: &[Vec<u8>]) -> HeifResult<()> {
    stream.write_u16(u16_from_usize(nal_units.len())?)?;
    for nal in nal_units {
        stream.write_u16(u16_from_usize(nal.len())?)?;
        stream.write_slice(nal)?;
    }
    Ok(())
}

// Each stored parameter set is framed with a 4-byte length, matching the
// length-prefixed sample framing.
fn append_length_prefixed(dest: &mut Vec<u8>, nal_units: &[Vec<u8>]) {
    for nal in nal_units {
        dest.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        dest.extend_from_slice(nal);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HevcDecoderConfiguration {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    // 48 significant bits.
    pub general_constraint_indicator_flags: u64,
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
}

impl Default for HevcDecoderConfiguration {
    fn default() -> Self {
        HevcDecoderConfiguration {
            configuration_version: 1,
            general_profile_space: 0,
            general_tier_flag: false,
            general_profile_idc: 0,
            general_profile_compatibility_flags: 0,
            general_constraint_indicator_flags: 0,
            general_level_idc: 0,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format_idc: 0,
            bit_depth_luma: 8,
            bit_depth_chroma: 8,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HevcConfigurationBox {
    configuration: HevcDecoderConfiguration,
    // Byte length of the NAL unit length prefixes in the samples; 1, 2 or 4.
    nal_length_size: u8,
    nal_arrays: Vec<NalArray>,
}

impl Default for HevcConfigurationBox {
    fn default() -> Self {
        HevcConfigurationBox {
            configuration: HevcDecoderConfiguration::default(),
            nal_length_size: 4,
            nal_arrays: Vec::new(),
        }
    }
}

impl HevcConfigurationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<HevcConfigurationBox> {
        // The fixed 23-byte configuration prefix.
        let mut bits = stream.sub_bit_stream(22)?;
        // unsigned int(8) configuration_version;
        let configuration_version = bits.read(8)? as u8;
        let configuration = HevcDecoderConfiguration {
            configuration_version,
            // unsigned int(2) general_profile_space;
            general_profile_space: bits.read(2)? as u8,
            // unsigned int(1) general_tier_flag;
            general_tier_flag: bits.read_bool()?,
            // unsigned int(5) general_profile_idc;
            general_profile_idc: bits.read(5)? as u8,
            // unsigned int(32) general_profile_compatibility_flags;
            general_profile_compatibility_flags: bits.read(16)? << 16 | bits.read(16)?,
            // unsigned int(48) general_constraint_indicator_flags;
            general_constraint_indicator_flags: (bits.read(24)? as u64) << 24
                | bits.read(24)? as u64,
            // unsigned int(8) general_level_idc;
            general_level_idc: bits.read(8)? as u8,
            // bit(4) reserved; unsigned int(12) min_spatial_segmentation_idc;
            min_spatial_segmentation_idc: {
                bits.read(4)?;
                bits.read(12)? as u16
            },
            // bit(6) reserved; unsigned int(2) parallelism_type;
            parallelism_type: {
                bits.read(6)?;
                bits.read(2)? as u8
            },
            // bit(6) reserved; unsigned int(2) chroma_format_idc;
            chroma_format_idc: {
                bits.read(6)?;
                bits.read(2)? as u8
            },
            // bit(5) reserved; unsigned int(3) bit_depth_luma_minus8;
            bit_depth_luma: {
                bits.read(5)?;
                bits.read(3)? as u8 + 8
            },
            // bit(5) reserved; unsigned int(3) bit_depth_chroma_minus8;
            bit_depth_chroma: {
                bits.read(5)?;
                bits.read(3)? as u8 + 8
            },
            // unsigned int(16) avg_frame_rate;
            avg_frame_rate: bits.read(16)? as u16,
            // unsigned int(2) constant_frame_rate;
            constant_frame_rate: bits.read(2)? as u8,
            // unsigned int(3) num_temporal_layers;
            num_temporal_layers: bits.read(3)? as u8,
            // unsigned int(1) temporal_id_nested;
            temporal_id_nested: bits.read_bool()?,
        };
        // unsigned int(2) length_size_minus_one;
        let nal_length_size = bits.read(2)? as u8 + 1;
        if nal_length_size != 1 && nal_length_size != 2 && nal_length_size != 4 {
            return Err(HeifError::InvalidField(format!(
                "hvcC NAL length size {nal_length_size}"
            )));
        }
        // unsigned int(8) num_of_arrays;
        let num_of_arrays = stream.read_u8()?;
        let mut nal_arrays = Vec::new();
        for _ in 0..num_of_arrays {
            let mut array_bits = stream.sub_bit_stream(1)?;
            // unsigned int(1) array_completeness; bit(1) reserved;
            // unsigned int(6) NAL_unit_type;
            let array_completeness = array_bits.read_bool()?;
            array_bits.read(1)?;
            let nal_unit_type = array_bits.read(6)? as u8;
            nal_arrays.push(NalArray {
                array_completeness,
                nal_unit_type,
                nal_units: parse_nal_units(stream)?,
            });
        }
        Ok(HevcConfigurationBox {
            configuration,
            nal_length_size,
            nal_arrays,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        let c = &self.configuration;
        stream.write_u8(c.configuration_version)?;
        stream.write_bits(c.general_profile_space as u32, 2)?;
        stream.write_bool(c.general_tier_flag)?;
        stream.write_bits(c.general_profile_idc as u32, 5)?;
        stream.write_u32(c.general_profile_compatibility_flags)?;
        stream.write_bits((c.general_constraint_indicator_flags >> 24) as u32 & 0xFFFFFF, 24)?;
        stream.write_bits(c.general_constraint_indicator_flags as u32 & 0xFFFFFF, 24)?;
        stream.write_u8(c.general_level_idc)?;
        stream.write_bits(0b1111, 4)?;
        stream.write_bits(c.min_spatial_segmentation_idc as u32, 12)?;
        stream.write_bits(0b111111, 6)?;
        stream.write_bits(c.parallelism_type as u32, 2)?;
        stream.write_bits(0b111111, 6)?;
        stream.write_bits(c.chroma_format_idc as u32, 2)?;
        stream.write_bits(0b11111, 5)?;
        stream.write_bits(c.bit_depth_luma.saturating_sub(8) as u32, 3)?;
        stream.write_bits(0b11111, 5)?;
        stream.write_bits(c.bit_depth_chroma.saturating_sub(8) as u32, 3)?;
        stream.write_u16(c.avg_frame_rate)?;
        stream.write_bits(c.constant_frame_rate as u32, 2)?;
        stream.write_bits(c.num_temporal_layers as u32, 3)?;
        stream.write_bool(c.temporal_id_nested)?;
        stream.write_bits(self.nal_length_size as u32 - 1, 2)?;
        stream.write_u8(u8_from_usize(self.nal_arrays.len())?)?;
        for array in &self.nal_arrays {
            stream.write_bool(array.array_completeness)?;
            stream.write_bits(0, 1)?;
            stream.write_bits(array.nal_unit_type as u32, 6)?;
            write_nal_units(stream, &array.nal_units)?;
        }
        Ok(())
    }

    pub fn configuration(&self) -> &HevcDecoderConfiguration {
        &self.configuration
    }

    pub fn set_configuration(&mut self, configuration: HevcDecoderConfiguration) {
        self.configuration = configuration;
    }

    pub fn nal_length_size(&self) -> u8 {
        self.nal_length_size
    }

    pub fn nal_arrays(&self) -> &[NalArray] {
        &self.nal_arrays
    }

    /// Files the NAL unit under the array for its type (the type lives in
    /// the high bits of the first header byte).
    pub fn append_nal_data(&mut self, nal: &[u8]) -> HeifResult<()> {
        if nal.is_empty() {
            return Err(HeifError::InvalidField("empty NAL unit".into()));
        }
        let nal_unit_type = (nal[0] >> 1) & 0x3F;
        let array = match self
            .nal_arrays
            .iter_mut()
            .find(|array| array.nal_unit_type == nal_unit_type)
        {
            Some(array) => array,
            None => {
                self.nal_arrays.push(NalArray {
                    array_completeness: true,
                    nal_unit_type,
                    nal_units: Vec::new(),
                });
                self.nal_arrays.last_mut().unwrap()
            }
        };
        array.nal_units.push(nal.to_vec());
        Ok(())
    }

    /// Concatenates the stored parameter sets into a bitstream preamble to
    /// be prepended to each sample.
    pub fn get_headers(&self, dest: &mut Vec<u8>) {
        for array in &self.nal_arrays {
            append_length_prefixed(dest, &array.nal_units);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Av1CodecConfiguration {
    pub seq_profile: u8,
    pub seq_level_idx0: u8,
    pub seq_tier0: u8,
    pub high_bitdepth: bool,
    pub twelve_bit: bool,
    pub monochrome: bool,
    pub chroma_subsampling_x: u8,
    pub chroma_subsampling_y: u8,
    pub chroma_sample_position: u8,
    pub initial_presentation_delay_present: bool,
    pub initial_presentation_delay_minus_one: u8,
}

impl Default for Av1CodecConfiguration {
    fn default() -> Self {
        Av1CodecConfiguration {
            seq_profile: 0,
            seq_level_idx0: 0,
            seq_tier0: 0,
            high_bitdepth: false,
            twelve_bit: false,
            monochrome: false,
            chroma_subsampling_x: 1,
            chroma_subsampling_y: 1,
            chroma_sample_position: 0,
            initial_presentation_delay_present: false,
            initial_presentation_delay_minus_one: 0,
        }
    }
}

impl Av1CodecConfiguration {
    pub fn depth(&self) -> u8 {
        match (self.twelve_bit, self.high_bitdepth) {
            (true, _) => 12,
            (false, true) => 10,
            (false, false) => 8,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Av1ConfigurationBox {
    configuration: Av1CodecConfiguration,
    config_obus: Vec<u8>,
}

impl Av1ConfigurationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<Av1ConfigurationBox> {
        let mut bits = stream.sub_bit_stream(4)?;
        // unsigned int(1) marker = 1;
        if bits.read(1)? != 1 {
            return Err(HeifError::InvalidField("av1C marker is not set".into()));
        }
        // unsigned int(7) version = 1;
        let version = bits.read(7)?;
        if version != 1 {
            return Err(HeifError::UnsupportedVersion(format!("av1C version {version}")));
        }
        let configuration = Av1CodecConfiguration {
            // unsigned int(3) seq_profile;
            seq_profile: bits.read(3)? as u8,
            // unsigned int(5) seq_level_idx_0;
            seq_level_idx0: bits.read(5)? as u8,
            // unsigned int(1) seq_tier_0;
            seq_tier0: bits.read(1)? as u8,
            // unsigned int(1) high_bitdepth;
            high_bitdepth: bits.read_bool()?,
            // unsigned int(1) twelve_bit;
            twelve_bit: bits.read_bool()?,
            // unsigned int(1) monochrome;
            monochrome: bits.read_bool()?,
            // unsigned int(1) chroma_subsampling_x;
            chroma_subsampling_x: bits.read(1)? as u8,
            // unsigned int(1) chroma_subsampling_y;
            chroma_subsampling_y: bits.read(1)? as u8,
            // unsigned int(2) chroma_sample_position;
            chroma_sample_position: bits.read(2)? as u8,
            // unsigned int(3) reserved = 0;
            // unsigned int(1) initial_presentation_delay_present;
            initial_presentation_delay_present: {
                bits.read(3)?;
                bits.read_bool()?
            },
            // unsigned int(4) initial_presentation_delay_minus_one / reserved;
            initial_presentation_delay_minus_one: bits.read(4)? as u8,
        };
        // unsigned int(8) configOBUs[]; // to end of box
        let config_obus = stream.get_slice(stream.bytes_left())?.to_vec();
        Ok(Av1ConfigurationBox {
            configuration,
            config_obus,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        let c = &self.configuration;
        stream.write_bits(1, 1)?;
        stream.write_bits(1, 7)?;
        stream.write_bits(c.seq_profile as u32, 3)?;
        stream.write_bits(c.seq_level_idx0 as u32, 5)?;
        stream.write_bits(c.seq_tier0 as u32, 1)?;
        stream.write_bool(c.high_bitdepth)?;
        stream.write_bool(c.twelve_bit)?;
        stream.write_bool(c.monochrome)?;
        stream.write_bits(c.chroma_subsampling_x as u32, 1)?;
        stream.write_bits(c.chroma_subsampling_y as u32, 1)?;
        stream.write_bits(c.chroma_sample_position as u32, 2)?;
        stream.write_bits(0, 3)?;
        stream.write_bool(c.initial_presentation_delay_present)?;
        if c.initial_presentation_delay_present {
            stream.write_bits(c.initial_presentation_delay_minus_one as u32, 4)?;
        } else {
            stream.write_bits(0, 4)?;
        }
        stream.write_slice(&self.config_obus)
    }

    pub fn configuration(&self) -> &Av1CodecConfiguration {
        &self.configuration
    }

    pub fn set_configuration(&mut self, configuration: Av1CodecConfiguration) {
        self.configuration = configuration;
    }

    pub fn set_config_obus(&mut self, config_obus: Vec<u8>) {
        self.config_obus = config_obus;
    }

    /// The raw configuration OBUs, prepended to each sample.
    pub fn get_headers(&self, dest: &mut Vec<u8>) {
        dest.extend_from_slice(&self.config_obus);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VvcDecoderConfiguration {
    pub configuration_version: u8,
    pub avg_frame_rate_times_256: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub chroma_format_present: bool,
    pub chroma_format_idc: u8,
    pub bit_depth_present: bool,
    pub bit_depth: u8,
}

impl Default for VvcDecoderConfiguration {
    fn default() -> Self {
        VvcDecoderConfiguration {
            configuration_version: 1,
            avg_frame_rate_times_256: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            chroma_format_present: false,
            chroma_format_idc: 0,
            bit_depth_present: false,
            bit_depth: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VvcConfigurationBox {
    configuration: VvcDecoderConfiguration,
    nal_length_size: u8,
    nal_arrays: Vec<NalArray>,
}

impl Default for VvcConfigurationBox {
    fn default() -> Self {
        VvcConfigurationBox {
            configuration: VvcDecoderConfiguration::default(),
            nal_length_size: 4,
            nal_arrays: Vec::new(),
        }
    }
}

impl VvcConfigurationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<VvcConfigurationBox> {
        let mut configuration = VvcDecoderConfiguration {
            // unsigned int(8) configuration_version;
            configuration_version: stream.read_u8()?,
            // unsigned int(16) avg_frame_rate_times_256;
            avg_frame_rate_times_256: stream.read_u16()?,
            ..VvcDecoderConfiguration::default()
        };
        if configuration.configuration_version != 1 {
            return Err(HeifError::UnsupportedVersion(format!(
                "vvcC version {}",
                configuration.configuration_version
            )));
        }
        let mut bits = stream.sub_bit_stream(2)?;
        // unsigned int(2) constant_frame_rate;
        configuration.constant_frame_rate = bits.read(2)? as u8;
        // unsigned int(3) num_temporal_layers;
        configuration.num_temporal_layers = bits.read(3)? as u8;
        // unsigned int(2) length_size_minus_one;
        let nal_length_size = bits.read(2)? as u8 + 1;
        if nal_length_size != 1 && nal_length_size != 2 && nal_length_size != 4 {
            return Err(HeifError::InvalidField(format!(
                "vvcC NAL length size {nal_length_size}"
            )));
        }
        // unsigned int(1) ptl_present_flag;
        if bits.read_bool()? {
            // The PTL record layout varies with its contents; the whole box
            // is retained opaquely instead.
            return Err(HeifError::UnsupportedVersion("vvcC with PTL record".into()));
        }
        // unsigned int(1) chroma_format_present_flag;
        configuration.chroma_format_present = bits.read_bool()?;
        // unsigned int(2) chroma_format_idc;
        configuration.chroma_format_idc = bits.read(2)? as u8;
        // unsigned int(1) bit_depth_present_flag;
        configuration.bit_depth_present = bits.read_bool()?;
        // unsigned int(3) bit_depth_minus8;
        configuration.bit_depth = bits.read(3)? as u8 + 8;
        // bit(1) reserved;
        bits.read(1)?;
        // unsigned int(8) num_of_arrays;
        let num_of_arrays = stream.read_u8()?;
        let mut nal_arrays = Vec::new();
        for _ in 0..num_of_arrays {
            let mut array_bits = stream.sub_bit_stream(1)?;
            // unsigned int(1) array_completeness; bit(2) reserved;
            // unsigned int(5) NAL_unit_type;
            let array_completeness = array_bits.read_bool()?;
            array_bits.read(2)?;
            let nal_unit_type = array_bits.read(5)? as u8;
            nal_arrays.push(NalArray {
                array_completeness,
                nal_unit_type,
                nal_units: parse_nal_units(stream)?,
            });
        }
        Ok(VvcConfigurationBox {
            configuration,
            nal_length_size,
            nal_arrays,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        let c = &self.configuration;
        stream.write_u8(c.configuration_version)?;
        stream.write_u16(c.avg_frame_rate_times_256)?;
        stream.write_bits(c.constant_frame_rate as u32, 2)?;
        stream.write_bits(c.num_temporal_layers as u32, 3)?;
        stream.write_bits(self.nal_length_size as u32 - 1, 2)?;
        // ptl_present_flag; never written.
        stream.write_bool(false)?;
        stream.write_bool(c.chroma_format_present)?;
        stream.write_bits(c.chroma_format_idc as u32, 2)?;
        stream.write_bool(c.bit_depth_present)?;
        stream.write_bits(c.bit_depth.saturating_sub(8) as u32, 3)?;
        stream.write_bits(0, 1)?;
        stream.write_u8(u8_from_usize(self.nal_arrays.len())?)?;
        for array in &self.nal_arrays {
            stream.write_bool(array.array_completeness)?;
            stream.write_bits(0, 2)?;
            stream.write_bits(array.nal_unit_type as u32, 5)?;
            write_nal_units(stream, &array.nal_units)?;
        }
        Ok(())
    }

    pub fn configuration(&self) -> &VvcDecoderConfiguration {
        &self.configuration
    }

    pub fn set_configuration(&mut self, configuration: VvcDecoderConfiguration) {
        self.configuration = configuration;
    }

    pub fn nal_length_size(&self) -> u8 {
        self.nal_length_size
    }

    /// Files the NAL unit under the array for its type (second header byte,
    /// high 5 bits).
    pub fn append_nal_data(&mut self, nal: &[u8]) -> HeifResult<()> {
        if nal.len() < 2 {
            return Err(HeifError::InvalidField("short NAL unit".into()));
        }
        let nal_unit_type = nal[1] >> 3;
        let array = match self
            .nal_arrays
            .iter_mut()
            .find(|array| array.nal_unit_type == nal_unit_type)
        {
            Some(array) => array,
            None => {
                self.nal_arrays.push(NalArray {
                    array_completeness: true,
                    nal_unit_type,
                    nal_units: Vec::new(),
                });
                self.nal_arrays.last_mut().unwrap()
            }
        };
        array.nal_units.push(nal.to_vec());
        Ok(())
    }

    pub fn get_headers(&self, dest: &mut Vec<u8>) {
        for array in &self.nal_arrays {
            append_length_prefixed(dest, &array.nal_units);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hvcc_round_trip() {
        let mut hvcc = HevcConfigurationBox::default();
        hvcc.set_configuration(HevcDecoderConfiguration {
            general_profile_idc: 1,
            general_profile_compatibility_flags: 0x60000000,
            general_constraint_indicator_flags: 0x9000_0000_0000,
            general_level_idc: 93,
            chroma_format_idc: 1,
            num_temporal_layers: 1,
            temporal_id_nested: true,
            ..HevcDecoderConfiguration::default()
        });
        // NAL type is in bits 6..1 of the first byte: 32 = VPS, 33 = SPS.
        hvcc.append_nal_data(&[32 << 1, 0x01, 0x02]).unwrap();
        hvcc.append_nal_data(&[33 << 1, 0x03]).unwrap();
        hvcc.append_nal_data(&[33 << 1, 0x04]).unwrap();
        assert_eq!(hvcc.nal_arrays().len(), 2);
        assert_eq!(hvcc.nal_arrays()[1].nal_units.len(), 2);

        let mut out = OStream::default();
        hvcc.write(&mut out).unwrap();
        // 23 fixed bytes, 1 array count.
        assert_eq!(out.data[0], 1);
        let parsed = HevcConfigurationBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed, hvcc);

        let mut headers = Vec::new();
        parsed.get_headers(&mut headers);
        assert_eq!(
            headers,
            vec![0, 0, 0, 3, 64, 1, 2, 0, 0, 0, 2, 66, 3, 0, 0, 0, 2, 66, 4]
        );
    }

    #[test]
    fn av1c_round_trip() {
        let av1c = Av1ConfigurationBox {
            configuration: Av1CodecConfiguration {
                seq_profile: 2,
                seq_level_idx0: 8,
                high_bitdepth: true,
                ..Av1CodecConfiguration::default()
            },
            config_obus: vec![0x0a, 0x0b, 0x0c],
        };
        assert_eq!(av1c.configuration().depth(), 10);
        let mut out = OStream::default();
        av1c.write(&mut out).unwrap();
        assert_eq!(out.data.len(), 7);
        assert_eq!(out.data[0], 0x81);
        let parsed = Av1ConfigurationBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed, av1c);
        let mut headers = Vec::new();
        parsed.get_headers(&mut headers);
        assert_eq!(headers, vec![0x0a, 0x0b, 0x0c]);
    }

    #[test]
    fn av1c_rejects_bad_marker() {
        let data = [0x01u8, 0, 0, 0];
        assert!(Av1ConfigurationBox::parse(&mut IStream::create(&data)).is_err());
    }

    #[test]
    fn vvcc_round_trip() {
        let mut vvcc = VvcConfigurationBox::default();
        vvcc.set_configuration(VvcDecoderConfiguration {
            chroma_format_present: true,
            chroma_format_idc: 1,
            bit_depth_present: true,
            bit_depth: 10,
            ..VvcDecoderConfiguration::default()
        });
        // VVC NAL type is in the high 5 bits of the second header byte.
        vvcc.append_nal_data(&[0x00, 15 << 3, 0xaa]).unwrap();
        let mut out = OStream::default();
        vvcc.write(&mut out).unwrap();
        let parsed = VvcConfigurationBox::parse(&mut IStream::create(&out.data)).unwrap();
        assert_eq!(parsed, vvcc);
    }

    #[test]
    fn vvcc_with_ptl_is_not_parsed() {
        let mut out = OStream::default();
        out.write_u8(1).unwrap();
        out.write_u16(0).unwrap();
        // constant_frame_rate=0, layers=1, length_size_minus_one=3, ptl=1
        out.write_bits(0, 2).unwrap();
        out.write_bits(1, 3).unwrap();
        out.write_bits(3, 2).unwrap();
        out.write_bool(true).unwrap();
        out.write_u8(0).unwrap();
        assert!(matches!(
            VvcConfigurationBox::parse(&mut IStream::create(&out.data)),
            Err(HeifError::UnsupportedVersion(_))
        ));
    }
}
