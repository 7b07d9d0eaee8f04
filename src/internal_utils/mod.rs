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

pub mod stream;

use crate::HeifError;
use crate::HeifResult;

macro_rules! checked_add {
    ($a:expr, $b:expr) => {
        $a.checked_add($b)
            .ok_or(crate::HeifError::InvalidField("integer overflow".into()))
    };
}

macro_rules! checked_sub {
    ($a:expr, $b:expr) => {
        $a.checked_sub($b)
            .ok_or(crate::HeifError::InvalidField("integer underflow".into()))
    };
}

macro_rules! checked_incr {
    ($a:expr, $b:expr) => {
        $a = checked_add!($a, $b)?
    };
}

pub(crate) use checked_add;
pub(crate) use checked_incr;
pub(crate) use checked_sub;

macro_rules! conversion_function {
    ($func:ident, $to: ident, $from:ty) => {
        pub(crate) fn $func(value: $from) -> HeifResult<$to> {
            $to::try_from(value).or(Err(HeifError::InvalidField(concat!(
                stringify!($from),
                " out of range for ",
                stringify!($to)
            )
            .into())))
        }
    };
}

conversion_function!(usize_from_u64, usize, u64);
conversion_function!(u64_from_usize, u64, usize);
conversion_function!(u32_from_usize, u32, usize);
conversion_function!(u32_from_u64, u32, u64);
conversion_function!(u16_from_usize, u16, usize);
conversion_function!(u16_from_u32, u16, u32);
conversion_function!(u8_from_usize, u8, usize);
conversion_function!(i32_from_u32, i32, u32);
