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

use crate::fraction::Fraction;
use crate::internal_utils::stream::*;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImageSpatialExtentsBox {
    pub version: u8,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageSpatialExtentsBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ImageSpatialExtentsBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        Ok(ImageSpatialExtentsBox {
            version,
            flags,
            // unsigned int(32) image_width;
            width: stream.read_u32()?,
            // unsigned int(32) image_height;
            height: stream.read_u32()?,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_u32(self.width)?;
        stream.write_u32(self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelAspectRatioBox {
    pub h_spacing: u32,
    pub v_spacing: u32,
}

impl Default for PixelAspectRatioBox {
    fn default() -> Self {
        PixelAspectRatioBox {
            h_spacing: 1,
            v_spacing: 1,
        }
    }
}

impl PixelAspectRatioBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<PixelAspectRatioBox> {
        Ok(PixelAspectRatioBox {
            // unsigned int(32) hSpacing;
            h_spacing: stream.read_u32()?,
            // unsigned int(32) vSpacing;
            v_spacing: stream.read_u32()?,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u32(self.h_spacing)?;
        stream.write_u32(self.v_spacing)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PixelInformationBox {
    pub version: u8,
    pub flags: u32,
    bits_per_channel: Vec<u8>,
}

impl PixelInformationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<PixelInformationBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        // unsigned int(8) num_channels;
        let num_channels = stream.read_u8()?;
        let mut bits_per_channel = Vec::new();
        for _ in 0..num_channels {
            // unsigned int(8) bits_per_channel;
            bits_per_channel.push(stream.read_u8()?);
        }
        Ok(PixelInformationBox {
            version,
            flags,
            bits_per_channel,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_u8(u8_from_usize(self.bits_per_channel.len())?)?;
        for bits in &self.bits_per_channel {
            stream.write_u8(*bits)?;
        }
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.bits_per_channel.len()
    }

    pub fn bits_per_channel(&self, channel: usize) -> Option<u8> {
        self.bits_per_channel.get(channel).copied()
    }

    pub fn add_channel_bits(&mut self, bits: u8) {
        self.bits_per_channel.push(bits);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImageRotationBox {
    // Stored as the wire value: counter-clockwise rotation in units of 90
    // degrees, 0..=3.
    angle: u8,
}

impl ImageRotationBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ImageRotationBox> {
        let mut bits = stream.sub_bit_stream(1)?;
        // unsigned int(6) reserved = 0;
        if bits.read(6)? != 0 {
            return Err(HeifError::InvalidField("nonzero reserved bits in irot".into()));
        }
        // unsigned int(2) angle;
        let angle = bits.read(2)? as u8;
        Ok(ImageRotationBox { angle })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.angle & 0x3)
    }

    pub fn rotation_ccw(&self) -> u16 {
        self.angle as u16 * 90
    }

    // Only these multiples of 90 are allowed: 0, 90, 180, 270.
    pub fn set_rotation_ccw(&mut self, degrees: u16) -> HeifResult<()> {
        if degrees % 90 != 0 || degrees > 270 {
            return Err(HeifError::InvalidField(format!("invalid rotation {degrees}")));
        }
        self.angle = ((degrees / 90) & 0x3) as u8;
        Ok(())
    }
}

pub const MIRROR_AXIS_VERTICAL: u8 = 0;
pub const MIRROR_AXIS_HORIZONTAL: u8 = 1;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImageMirrorBox {
    pub axis: u8,
}

impl ImageMirrorBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ImageMirrorBox> {
        let mut bits = stream.sub_bit_stream(1)?;
        // unsigned int(7) reserved = 0;
        if bits.read(7)? != 0 {
            return Err(HeifError::InvalidField("nonzero reserved bits in imir".into()));
        }
        // unsigned int(1) axis;
        let axis = bits.read(1)? as u8;
        Ok(ImageMirrorBox { axis })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.axis & 0x1)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuxiliaryTypeBox {
    pub version: u8,
    pub flags: u32,
    pub aux_type: String,
    pub aux_subtypes: Vec<u8>,
}

impl AuxiliaryTypeBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<AuxiliaryTypeBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        // utf8string aux_type;
        let aux_type = stream.read_c_string()?;
        // unsigned int(8) aux_subtype[]; // to end of box
        let aux_subtypes = stream.get_slice(stream.bytes_left())?.to_vec();
        Ok(AuxiliaryTypeBox {
            version,
            flags,
            aux_type,
            aux_subtypes,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_str_with_nul(&self.aux_type)?;
        stream.write_slice(&self.aux_subtypes)
    }
}

/// The rounded crop window, inclusive coordinates within the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanApertureBox {
    pub width: Fraction,
    pub height: Fraction,
    pub horizontal_offset: Fraction,
    pub vertical_offset: Fraction,
}

impl Default for CleanApertureBox {
    fn default() -> Self {
        CleanApertureBox {
            width: Fraction::default(),
            height: Fraction::default(),
            horizontal_offset: Fraction::default(),
            vertical_offset: Fraction::default(),
        }
    }
}

impl CleanApertureBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<CleanApertureBox> {
        let clap = CleanApertureBox {
            // unsigned int(32) cleanApertureWidthN/D;
            width: stream.read_ufraction()?,
            // unsigned int(32) cleanApertureHeightN/D;
            height: stream.read_ufraction()?,
            // int(32) horizOffN; unsigned int(32) horizOffD;
            horizontal_offset: stream.read_sfraction()?,
            // int(32) vertOffN; unsigned int(32) vertOffD;
            vertical_offset: stream.read_sfraction()?,
        };
        if !clap.width.is_valid()
            || !clap.height.is_valid()
            || !clap.horizontal_offset.is_valid()
            || !clap.vertical_offset.is_valid()
        {
            return Err(HeifError::FractionInvalid);
        }
        Ok(clap)
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_ufraction(self.width)?;
        stream.write_ufraction(self.height)?;
        stream.write_sfraction(self.horizontal_offset)?;
        stream.write_sfraction(self.vertical_offset)
    }

    /// Crop anchored at the top-left corner of the image.
    pub fn set(&mut self, clap_width: u32, clap_height: u32, image_width: u32, image_height: u32) {
        self.width = Fraction::new_u32(clap_width, 1);
        self.height = Fraction::new_u32(clap_height, 1);
        self.horizontal_offset = Self::offset_fraction(clap_width, image_width);
        self.vertical_offset = Self::offset_fraction(clap_height, image_height);
    }

    fn offset_fraction(clap: u32, image: u32) -> Fraction {
        let difference = clap as i64 - image as i64;
        match i32::try_from(difference) {
            Ok(numerator) => Fraction::new(numerator, 2),
            Err(_) => Fraction::new(0, 0),
        }
    }

    fn center_x(&self, image_width: i32) -> Fraction {
        // (image_width - 1) / 2 + horizontal_offset
        Fraction::new(image_width - 1, 2).add(self.horizontal_offset)
    }

    fn center_y(&self, image_height: i32) -> Fraction {
        Fraction::new(image_height - 1, 2).add(self.vertical_offset)
    }

    /// First column of the cropped image, rounded towards the inside.
    pub fn left_rounded(&self, image_width: i32) -> i32 {
        // left = center - (width - 1) / 2
        self.center_x(image_width)
            .sub(self.width.sub_i32(1).div_i32(2))
            .round_up()
    }

    /// Last column that is part of the cropped image.
    pub fn right_rounded(&self, image_width: i32) -> i32 {
        // right = center + width / 2
        self.center_x(image_width).add(self.width.div_i32(2)).round_down()
    }

    pub fn top_rounded(&self, image_height: i32) -> i32 {
        self.center_y(image_height)
            .sub(self.height.sub_i32(1).div_i32(2))
            .round_up()
    }

    pub fn bottom_rounded(&self, image_height: i32) -> i32 {
        self.center_y(image_height).add(self.height.div_i32(2)).round_down()
    }

    pub fn width_rounded(&self) -> i32 {
        self.width.round()
    }

    pub fn height_rounded(&self) -> i32 {
        self.height.round()
    }

    /// The rounded crop window; rejected unless all four fractions are
    /// valid and the window lies within the image.
    pub fn crop_rect(&self, image_width: u32, image_height: u32) -> HeifResult<CropRect> {
        if !self.width.is_valid()
            || !self.height.is_valid()
            || !self.horizontal_offset.is_valid()
            || !self.vertical_offset.is_valid()
        {
            return Err(HeifError::FractionInvalid);
        }
        let image_width = i32_from_u32(image_width)?;
        let image_height = i32_from_u32(image_height)?;
        let rect = CropRect {
            left: self.left_rounded(image_width),
            top: self.top_rounded(image_height),
            right: self.right_rounded(image_width),
            bottom: self.bottom_rounded(image_height),
        };
        if rect.left < 0
            || rect.top < 0
            || rect.left > rect.right
            || rect.top > rect.bottom
            || rect.right >= image_width
            || rect.bottom >= image_height
        {
            return Err(HeifError::InvalidField(format!(
                "crop window [{}, {}]x[{}, {}] outside {image_width}x{image_height} image",
                rect.left, rect.right, rect.top, rect.bottom
            )));
        }
        Ok(rect)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LayerSelectorBox {
    pub layer_id: u16,
}

impl LayerSelectorBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<LayerSelectorBox> {
        // unsigned int(16) layer_id;
        let layer_id = stream.read_u16()?;
        Ok(LayerSelectorBox { layer_id })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u16(self.layer_id)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OperatingPointSelectorBox {
    pub op_index: u8,
}

impl OperatingPointSelectorBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<OperatingPointSelectorBox> {
        // unsigned int(8) op_index;
        let op_index = stream.read_u8()?;
        if op_index > 31 {
            // 31 is AV1's maximum operating point value.
            return Err(HeifError::InvalidField(format!("a1op op_index {op_index}")));
        }
        Ok(OperatingPointSelectorBox { op_index })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.op_index)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LayeredImageIndexingBox {
    // Whether the layer sizes use 32-bit fields on the wire.
    pub large_size: bool,
    pub layer_sizes: [u32; 3],
}

impl LayeredImageIndexingBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<LayeredImageIndexingBox> {
        let mut bits = stream.sub_bit_stream(1)?;
        // unsigned int(7) reserved = 0;
        if bits.read(7)? != 0 {
            return Err(HeifError::InvalidField("nonzero reserved bits in a1lx".into()));
        }
        // unsigned int(1) large_size;
        let large_size = bits.read_bool()?;
        let mut layer_sizes = [0u32; 3];
        for layer_size in &mut layer_sizes {
            *layer_size = if large_size {
                stream.read_u32()?
            } else {
                stream.read_u16()? as u32
            };
        }
        Ok(LayeredImageIndexingBox {
            large_size,
            layer_sizes,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(if self.large_size { 1 } else { 0 })?;
        for layer_size in &self.layer_sizes {
            if self.large_size {
                stream.write_u32(*layer_size)?;
            } else {
                stream.write_u16(u16_from_u32(*layer_size)?)?;
            }
        }
        Ok(())
    }

    pub(crate) fn derive_box_version(&mut self) {
        self.large_size = self.layer_sizes.iter().any(|size| *size > 0xFFFF);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ContentLightLevelBox {
    pub max_content_light_level: u16,
    pub max_pic_average_light_level: u16,
}

impl ContentLightLevelBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<ContentLightLevelBox> {
        Ok(ContentLightLevelBox {
            // unsigned int(16) max_content_light_level;
            max_content_light_level: stream.read_u16()?,
            // unsigned int(16) max_pic_average_light_level;
            max_pic_average_light_level: stream.read_u16()?,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u16(self.max_content_light_level)?;
        stream.write_u16(self.max_pic_average_light_level)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MasteringDisplayColourVolumeBox {
    pub display_primaries: [(u16, u16); 3],
    pub white_point: (u16, u16),
    pub max_display_mastering_luminance: u32,
    pub min_display_mastering_luminance: u32,
}

impl MasteringDisplayColourVolumeBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<MasteringDisplayColourVolumeBox> {
        let mut mdcv = MasteringDisplayColourVolumeBox::default();
        for primary in &mut mdcv.display_primaries {
            // unsigned int(16) display_primaries_x; display_primaries_y;
            primary.0 = stream.read_u16()?;
            primary.1 = stream.read_u16()?;
        }
        // unsigned int(16) white_point_x; white_point_y;
        mdcv.white_point.0 = stream.read_u16()?;
        mdcv.white_point.1 = stream.read_u16()?;
        // unsigned int(32) max_display_mastering_luminance;
        mdcv.max_display_mastering_luminance = stream.read_u32()?;
        // unsigned int(32) min_display_mastering_luminance;
        mdcv.min_display_mastering_luminance = stream.read_u32()?;
        Ok(mdcv)
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        for primary in &self.display_primaries {
            stream.write_u16(primary.0)?;
            stream.write_u16(primary.1)?;
        }
        stream.write_u16(self.white_point.0)?;
        stream.write_u16(self.white_point.1)?;
        stream.write_u32(self.max_display_mastering_luminance)?;
        stream.write_u32(self.min_display_mastering_luminance)
    }
}

/// User description property; there may be several, one per language.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserDescriptionBox {
    pub version: u8,
    pub flags: u32,
    // RFC 5646 language tag, e.g. "en-AU"; empty means unknown.
    pub lang: String,
    pub name: String,
    pub description: String,
    pub tags: String,
}

impl UserDescriptionBox {
    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<UserDescriptionBox> {
        let (version, flags) = stream.read_and_enforce_version_and_flags(0)?;
        Ok(UserDescriptionBox {
            version,
            flags,
            lang: stream.read_c_string()?,
            name: stream.read_c_string()?,
            description: stream.read_c_string()?,
            tags: stream.read_c_string()?,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_u8(self.version)?;
        stream.write_u24(self.flags)?;
        stream.write_str_with_nul(&self.lang)?;
        stream.write_str_with_nul(&self.name)?;
        stream.write_str_with_nul(&self.description)?;
        stream.write_str_with_nul(&self.tags)
    }
}
