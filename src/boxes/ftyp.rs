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
use crate::HeifResult;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileTypeBox {
    major_brand: FourCC,
    minor_version: u32,
    compatible_brands: Vec<FourCC>,
}

impl FileTypeBox {
    pub fn new(major_brand: FourCC, minor_version: u32) -> FileTypeBox {
        FileTypeBox {
            major_brand,
            minor_version,
            compatible_brands: Vec::new(),
        }
    }

    pub(crate) fn parse(stream: &mut IStream) -> HeifResult<FileTypeBox> {
        // unsigned int(32) major_brand;
        let major_brand = stream.read_fourcc()?;
        // unsigned int(32) minor_version;
        let minor_version = stream.read_u32()?;
        // unsigned int(32) compatible_brands[];
        let mut compatible_brands = Vec::new();
        while stream.bytes_left() >= 4 {
            compatible_brands.push(stream.read_fourcc()?);
        }
        // A trailing partial brand is ignored.
        stream.skip(stream.bytes_left())?;
        Ok(FileTypeBox {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    pub(crate) fn write(&self, stream: &mut OStream) -> HeifResult<()> {
        stream.write_fourcc(self.major_brand)?;
        stream.write_u32(self.minor_version)?;
        for brand in &self.compatible_brands {
            stream.write_fourcc(*brand)?;
        }
        Ok(())
    }

    pub fn major_brand(&self) -> FourCC {
        self.major_brand
    }

    pub fn set_major_brand(&mut self, major_brand: FourCC) {
        self.major_brand = major_brand;
    }

    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    pub fn set_minor_version(&mut self, minor_version: u32) {
        self.minor_version = minor_version;
    }

    pub fn has_compatible_brand(&self, brand: FourCC) -> bool {
        self.compatible_brands.contains(&brand)
    }

    /// Checks the major brand and the compatible list.
    pub fn has_brand(&self, brand: FourCC) -> bool {
        self.major_brand == brand || self.has_compatible_brand(brand)
    }

    pub fn list_brands(&self) -> &[FourCC] {
        &self.compatible_brands
    }

    pub fn add_compatible_brand(&mut self, brand: FourCC) {
        if !self.compatible_brands.contains(&brand) {
            self.compatible_brands.push(brand);
        }
    }

    pub fn clear_compatible_brands(&mut self) {
        self.compatible_brands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brands() {
        let mut ftyp = FileTypeBox::default();
        ftyp.set_major_brand(FourCC::new(b"heic"));
        ftyp.set_minor_version(0);
        ftyp.add_compatible_brand(FourCC::new(b"mif1"));
        ftyp.add_compatible_brand(FourCC::new(b"mif1"));
        assert_eq!(ftyp.list_brands().len(), 1);
        assert!(ftyp.has_brand(FourCC::new(b"heic")));
        assert!(!ftyp.has_compatible_brand(FourCC::new(b"heic")));
        assert!(ftyp.has_compatible_brand(FourCC::new(b"mif1")));
        ftyp.clear_compatible_brands();
        assert!(!ftyp.has_compatible_brand(FourCC::new(b"mif1")));
    }

    #[test]
    fn parse_ignores_trailing_partial_brand() {
        let mut body = Vec::new();
        body.extend_from_slice(b"heic");
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(b"mif1");
        body.extend_from_slice(b"xy");
        let mut stream = IStream::create(&body);
        let ftyp = FileTypeBox::parse(&mut stream).unwrap();
        assert_eq!(ftyp.list_brands(), &[FourCC::new(b"mif1")]);
        assert_eq!(stream.bytes_left(), 0);
    }
}
