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

use crate::HeifError;
use crate::HeifResult;

use std::fs::File;
use std::io::prelude::*;
use std::io::SeekFrom;

/// Byte source for on-demand extent resolution. `read` may return fewer
/// bytes than requested at the end of the stream; `read_exact` fails
/// instead.
pub trait GenericIO {
    fn read(&mut self, offset: u64, size: usize) -> HeifResult<&[u8]>;
    fn size_hint(&self) -> u64;

    fn read_exact(&mut self, offset: u64, size: usize) -> HeifResult<&[u8]> {
        let data = self.read(offset, size)?;
        if data.len() != size {
            return Err(HeifError::OffsetOutOfRange(format!(
                "requested {size} bytes at offset {offset}, got {}",
                data.len()
            )));
        }
        Ok(data)
    }
}

#[derive(Debug, Default)]
pub struct MemoryIO {
    data: Vec<u8>,
}

impl MemoryIO {
    pub fn create(data: Vec<u8>) -> MemoryIO {
        MemoryIO { data }
    }
}

impl GenericIO for MemoryIO {
    fn read(&mut self, offset: u64, size: usize) -> HeifResult<&[u8]> {
        let start = usize::try_from(offset)
            .or(Err(HeifError::OffsetOutOfRange("offset does not fit usize".into())))?;
        if start > self.data.len() {
            return Err(HeifError::OffsetOutOfRange(format!(
                "offset {offset} past end of {} bytes",
                self.data.len()
            )));
        }
        let end = std::cmp::min(start.saturating_add(size), self.data.len());
        Ok(&self.data[start..end])
    }

    fn size_hint(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug)]
pub struct FileIO {
    file: File,
    buffer: Vec<u8>,
}

impl FileIO {
    pub fn create(filename: &str) -> HeifResult<FileIO> {
        let file = File::open(filename).map_err(|err| HeifError::IoError(err.to_string()))?;
        Ok(FileIO {
            file,
            buffer: Vec::new(),
        })
    }
}

impl GenericIO for FileIO {
    fn read(&mut self, offset: u64, size: usize) -> HeifResult<&[u8]> {
        let file_size = self.size_hint();
        if offset > file_size {
            return Err(HeifError::OffsetOutOfRange(format!(
                "offset {offset} past end of {file_size} byte file"
            )));
        }
        let available = usize::try_from(file_size - offset).unwrap_or(usize::MAX);
        let size_to_read = std::cmp::min(size, available);
        self.buffer.resize(size_to_read, 0);
        if size_to_read > 0 {
            self.file
                .seek(SeekFrom::Start(offset))
                .map_err(|err| HeifError::IoError(err.to_string()))?;
            self.file
                .read_exact(self.buffer.as_mut_slice())
                .map_err(|err| HeifError::IoError(err.to_string()))?;
        }
        Ok(self.buffer.as_slice())
    }

    fn size_hint(&self) -> u64 {
        match self.file.metadata() {
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        }
    }
}
