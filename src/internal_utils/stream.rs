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
use crate::fraction::Fraction;
use crate::internal_utils::*;
use crate::HeifError;
use crate::HeifResult;

/// Reads big-endian bit fields out of a fixed byte window.
#[derive(Debug)]
pub struct IBitStream<'a> {
    bytes: &'a [u8],
    // Bits consumed so far.
    position: usize,
}

impl<'a> IBitStream<'a> {
    fn create(bytes: &'a [u8]) -> IBitStream<'a> {
        IBitStream { bytes, position: 0 }
    }

    pub fn read(&mut self, count: usize) -> HeifResult<u32> {
        assert!(count <= 32);
        if count == 0 {
            return Ok(0);
        }
        let end = self.position + count;
        if end > self.bytes.len() * 8 {
            return Err(HeifError::InvalidField(
                "bit field crosses the end of its range".into(),
            ));
        }
        // Gather every byte the field touches, then align and mask. A
        // 32-bit field can straddle five bytes, which still fits u64.
        let gathered = self.bytes[self.position / 8..(end + 7) / 8]
            .iter()
            .fold(0u64, |acc, &byte| acc << 8 | byte as u64);
        let unused_trailing_bits = (8 - end % 8) % 8;
        self.position = end;
        Ok(((gathered >> unused_trailing_bits) & ((1u64 << count) - 1)) as u32)
    }

    pub fn read_bool(&mut self) -> HeifResult<bool> {
        Ok(self.read(1)? == 1)
    }
}

/// Windowed byte reader over the unconsumed tail of a box body. Every box
/// parse gets its own window limited to the declared body, so a malformed
/// body can never read past it.
#[derive(Debug)]
pub struct IStream<'a> {
    remaining: &'a [u8],
}

impl<'a> IStream<'a> {
    pub fn create(data: &'a [u8]) -> IStream<'a> {
        IStream { remaining: data }
    }

    pub fn bytes_left(&self) -> usize {
        self.remaining.len()
    }

    pub fn has_bytes_left(&self) -> bool {
        !self.remaining.is_empty()
    }

    /// Consumes `size` bytes and returns them as a slice of the underlying
    /// buffer.
    pub fn get_slice(&mut self, size: usize) -> HeifResult<&'a [u8]> {
        // Copy the window reference out so the returned slice borrows the
        // underlying buffer, not this reader.
        let window: &'a [u8] = self.remaining;
        if size > window.len() {
            return Err(HeifError::InvalidField(format!(
                "{size} byte read crosses the end of a {} byte range",
                window.len()
            )));
        }
        let (consumed, rest) = window.split_at(size);
        self.remaining = rest;
        Ok(consumed)
    }

    /// Splits off an independent reader over the next `size` bytes.
    pub fn sub_stream(&mut self, size: usize) -> HeifResult<IStream<'a>> {
        Ok(IStream::create(self.get_slice(size)?))
    }

    pub fn sub_bit_stream(&mut self, num_bytes: usize) -> HeifResult<IBitStream<'a>> {
        Ok(IBitStream::create(self.get_slice(num_bytes)?))
    }

    pub fn skip(&mut self, size: usize) -> HeifResult<()> {
        self.get_slice(size)?;
        Ok(())
    }

    pub fn skip_u32(&mut self) -> HeifResult<()> {
        self.skip(4)
    }

    // Reads an xx-byte unsigned integer; a zero width encodes the value
    // zero without consuming anything.
    pub fn read_uxx(&mut self, xx: u8) -> HeifResult<u64> {
        let width = usize::from(xx);
        if width == 0 {
            return Ok(0);
        }
        if width > 8 {
            return Err(HeifError::InvalidField("integer width above 8 bytes".into()));
        }
        Ok(self
            .get_slice(width)?
            .iter()
            .fold(0u64, |acc, &byte| acc << 8 | byte as u64))
    }

    pub fn read_u8(&mut self) -> HeifResult<u8> {
        Ok(self.read_uxx(1)? as u8)
    }

    pub fn read_u16(&mut self) -> HeifResult<u16> {
        Ok(self.read_uxx(2)? as u16)
    }

    pub fn read_u24(&mut self) -> HeifResult<u32> {
        Ok(self.read_uxx(3)? as u32)
    }

    pub fn read_u32(&mut self) -> HeifResult<u32> {
        Ok(self.read_uxx(4)? as u32)
    }

    pub fn read_u64(&mut self) -> HeifResult<u64> {
        self.read_uxx(8)
    }

    pub fn read_fourcc(&mut self) -> HeifResult<FourCC> {
        let code = self.get_slice(4)?;
        Ok(FourCC([code[0], code[1], code[2], code[3]]))
    }

    // Reads size characters of a non-null-terminated string.
    pub fn read_string(&mut self, size: usize) -> HeifResult<String> {
        Ok(String::from_utf8(self.get_slice(size)?.to_vec()).unwrap_or_default())
    }

    // Reads a null-terminated string. A missing terminator is tolerated at
    // the end of the range.
    pub fn read_c_string(&mut self) -> HeifResult<String> {
        let (bytes, consumed) = match self.remaining.iter().position(|&byte| byte == b'\0') {
            Some(terminator) => (&self.remaining[..terminator], terminator + 1),
            None => (self.remaining, self.remaining.len()),
        };
        let value = String::from_utf8(bytes.to_vec()).unwrap_or_default();
        self.remaining = &self.remaining[consumed..];
        Ok(value)
    }

    pub fn read_ufraction(&mut self) -> HeifResult<Fraction> {
        Ok(Fraction::new_u32(self.read_u32()?, self.read_u32()?))
    }

    // Signed numerator, unsigned denominator on the wire.
    pub fn read_sfraction(&mut self) -> HeifResult<Fraction> {
        let numerator = self.read_u32()? as i32;
        let denominator = self.read_u32()?;
        if denominator > i32::MAX as u32 {
            return Ok(Fraction::new(numerator, 0));
        }
        Ok(Fraction::new(numerator, denominator as i32))
    }

    pub fn read_version_and_flags(&mut self) -> HeifResult<(u8, u32)> {
        let version = self.read_u8()?;
        let flags = self.read_u24()?;
        Ok((version, flags))
    }

    pub fn read_and_enforce_version_and_flags(
        &mut self,
        enforced_version: u8,
    ) -> HeifResult<(u8, u32)> {
        let (version, flags) = self.read_version_and_flags()?;
        if version != enforced_version {
            return Err(HeifError::UnsupportedVersion(format!(
                "version {version}, expected {enforced_version}"
            )));
        }
        Ok((version, flags))
    }
}

#[derive(Debug)]
struct BoxMarker {
    // Position of the leading 32-bit size field.
    offset: usize,
    // The size is encoded in the 64-bit field that follows the type.
    large: bool,
}

/// Append-only byte writer with positioned patching. `start_box` reserves
/// the size field; `finish_box` patches it once the body length is known.
#[derive(Debug, Default)]
pub struct OStream {
    // The bytes written so far.
    pub data: Vec<u8>,
    // If not zero, number of most significant bits already written in the
    // last byte of self.data.
    num_bits: u8,
    // Boxes that were started but not yet finished.
    box_markers: Vec<BoxMarker>,
}

impl OStream {
    pub fn offset(&self) -> usize {
        assert_eq!(self.num_bits, 0);
        self.data.len()
    }

    pub fn write_bits(&mut self, value: u32, num_bits: u8) -> HeifResult<()> {
        if num_bits == 0 || num_bits > 31 {
            return Err(HeifError::InvalidField("invalid bit count".into()));
        }
        if value >= (1 << num_bits) {
            return Err(HeifError::InvalidField("value does not fit bit count".into()));
        }
        let mut num_remaining_bits = num_bits;
        while num_remaining_bits != 0 {
            if self.num_bits == 0 {
                self.write_u8(0)?;
            }
            let byte = self.data.last_mut().unwrap();
            // Number of bits among num_bits that can be written in the last
            // byte of self.data.
            let num_written_bits = std::cmp::min(8 - self.num_bits, num_remaining_bits);
            // Write the most significant bits first.
            let written_bits = (value >> (num_remaining_bits - num_written_bits))
                & ((1u32 << num_written_bits) - 1);
            *byte |= (written_bits as u8) << (8 - self.num_bits - num_written_bits);
            num_remaining_bits -= num_written_bits;
            self.num_bits = (self.num_bits + num_written_bits) % 8;
        }
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> HeifResult<()> {
        self.write_bits(if value { 1 } else { 0 }, 1)
    }

    pub fn write_u8(&mut self, value: u8) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.push(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn write_u24(&mut self, value: u32) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        if value > 0xFFFFFF {
            return Err(HeifError::InvalidField("u24 out of range".into()));
        }
        self.data.extend_from_slice(&value.to_be_bytes()[1..]);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn write_u32_at_offset(&mut self, value: u32, offset: usize) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        let end = checked_add!(offset, 4)?;
        if end > self.data.len() {
            return Err(HeifError::OffsetOutOfRange("patch past end of stream".into()));
        }
        self.data[offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn write_u64_at_offset(&mut self, value: u64, offset: usize) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        let end = checked_add!(offset, 8)?;
        if end > self.data.len() {
            return Err(HeifError::OffsetOutOfRange("patch past end of stream".into()));
        }
        self.data[offset..end].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    // Writes an xx-byte unsigned integer; xx is one of {0, 4, 8}. A zero
    // width can only encode the value zero.
    pub fn write_uxx(&mut self, value: u64, xx: u8) -> HeifResult<()> {
        match xx {
            0 => {
                if value != 0 {
                    return Err(HeifError::WriterOverflow(
                        "nonzero value in zero-width field".into(),
                    ));
                }
                Ok(())
            }
            4 => {
                let narrow = u32::try_from(value)
                    .or(Err(HeifError::WriterOverflow("value does not fit u32".into())))?;
                self.write_u32(narrow)
            }
            8 => self.write_u64(value),
            _ => Err(HeifError::InvalidField("invalid field width".into())),
        }
    }

    pub fn write_str(&mut self, value: &str) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn write_str_with_nul(&mut self, value: &str) -> HeifResult<()> {
        self.write_str(value)?;
        self.write_u8(0)
    }

    pub fn write_slice(&mut self, data: &[u8]) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub fn write_fourcc(&mut self, value: FourCC) -> HeifResult<()> {
        self.write_slice(&value.0)
    }

    pub fn write_ufraction(&mut self, value: Fraction) -> HeifResult<()> {
        if !value.is_valid() || value.numerator < 0 {
            return Err(HeifError::FractionInvalid);
        }
        self.write_u32(value.numerator as u32)?;
        self.write_u32(value.denominator as u32)
    }

    pub fn write_sfraction(&mut self, value: Fraction) -> HeifResult<()> {
        if !value.is_valid() {
            return Err(HeifError::FractionInvalid);
        }
        self.write_u32(value.numerator as u32)?;
        self.write_u32(value.denominator as u32)
    }

    pub fn start_box_ext(
        &mut self,
        box_type: FourCC,
        uuid_type: Option<&[u8; 16]>,
        large: bool,
    ) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        self.box_markers.push(BoxMarker {
            offset: self.offset(),
            large,
        });
        if large {
            // The real size goes into the 64-bit field patched later.
            self.write_u32(1)?;
        } else {
            // 4 bytes for the size to be filled out later.
            self.write_u32(0)?;
        }
        self.write_fourcc(box_type)?;
        if large {
            self.write_u64(0)?;
        }
        if let Some(uuid) = uuid_type {
            self.write_slice(uuid)?;
        }
        Ok(())
    }

    pub fn start_box(&mut self, box_type: FourCC) -> HeifResult<()> {
        self.start_box_ext(box_type, None, false)
    }

    pub fn start_full_box(
        &mut self,
        box_type: FourCC,
        version_and_flags: (u8, u32),
    ) -> HeifResult<()> {
        self.start_box(box_type)?;
        self.write_u8(version_and_flags.0)?;
        self.write_u24(version_and_flags.1)
    }

    pub fn finish_box(&mut self) -> HeifResult<()> {
        assert_eq!(self.num_bits, 0);
        let marker = self
            .box_markers
            .pop()
            .ok_or(HeifError::InvalidField("finish_box without start_box".into()))?;
        let box_size = checked_sub!(self.offset(), marker.offset)?;
        if marker.large {
            self.write_u64_at_offset(u64_from_usize(box_size)?, marker.offset + 8)
        } else {
            let size = u32_from_usize(box_size)
                .or(Err(HeifError::WriterOverflow("box size needs 64 bits".into())))?;
            self.write_u32_at_offset(size, marker.offset)
        }
    }
}
