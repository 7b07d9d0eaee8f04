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

/// Signed rational used for cropping geometry. The denominator is kept
/// positive; a zero denominator marks the fraction invalid. Arithmetic
/// saturates to the invalid value on overflow, so consumers only need to
/// check `is_valid` at the end of a computation chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fraction {
    pub numerator: i32,
    pub denominator: i32,
}

const INVALID: Fraction = Fraction {
    numerator: 0,
    denominator: 0,
};

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

impl Fraction {
    pub fn new(numerator: i32, denominator: i32) -> Fraction {
        // Normalize the sign into the numerator.
        if denominator < 0 {
            match (numerator.checked_neg(), denominator.checked_neg()) {
                (Some(n), Some(d)) => Fraction {
                    numerator: n,
                    denominator: d,
                },
                _ => INVALID,
            }
        } else {
            Fraction {
                numerator,
                denominator,
            }
        }
    }

    // May only use values up to the i32 maximum.
    pub fn new_u32(numerator: u32, denominator: u32) -> Fraction {
        if numerator > i32::MAX as u32 || denominator > i32::MAX as u32 {
            return INVALID;
        }
        Fraction {
            numerator: numerator as i32,
            denominator: denominator as i32,
        }
    }

    pub fn is_valid(self) -> bool {
        self.denominator != 0
    }

    fn from_i64(numerator: i64, denominator: i64) -> Fraction {
        if denominator == 0 {
            return INVALID;
        }
        let g = gcd(numerator, denominator).abs().max(1);
        let n = numerator / g;
        let d = denominator / g;
        if n < i32::MIN as i64 || n > i32::MAX as i64 || d > i32::MAX as i64 {
            return INVALID;
        }
        Fraction::new(n as i32, d as i32)
    }

    pub fn add(self, other: Fraction) -> Fraction {
        if !self.is_valid() || !other.is_valid() {
            return INVALID;
        }
        let a = self.numerator as i64 * other.denominator as i64
            + other.numerator as i64 * self.denominator as i64;
        let b = self.denominator as i64 * other.denominator as i64;
        Fraction::from_i64(a, b)
    }

    pub fn sub(self, other: Fraction) -> Fraction {
        if !self.is_valid() || !other.is_valid() {
            return INVALID;
        }
        let a = self.numerator as i64 * other.denominator as i64
            - other.numerator as i64 * self.denominator as i64;
        let b = self.denominator as i64 * other.denominator as i64;
        Fraction::from_i64(a, b)
    }

    pub fn add_i32(self, value: i32) -> Fraction {
        self.add(Fraction::new(value, 1))
    }

    pub fn sub_i32(self, value: i32) -> Fraction {
        if !self.is_valid() {
            return INVALID;
        }
        let n = self.numerator as i64 - value as i64 * self.denominator as i64;
        Fraction::from_i64(n, self.denominator as i64)
    }

    pub fn div_i32(self, value: i32) -> Fraction {
        if !self.is_valid() || value == 0 {
            return INVALID;
        }
        Fraction::from_i64(self.numerator as i64, self.denominator as i64 * value as i64)
    }

    /// Largest integer not greater than the fraction.
    pub fn round_down(self) -> i32 {
        if !self.is_valid() {
            return 0;
        }
        (self.numerator as i64).div_euclid(self.denominator as i64) as i32
    }

    /// Smallest integer not less than the fraction.
    pub fn round_up(self) -> i32 {
        if !self.is_valid() {
            return 0;
        }
        let n = self.numerator as i64;
        let d = self.denominator as i64;
        (n + d - 1).div_euclid(d) as i32
    }

    /// Nearest integer, half rounding up.
    pub fn round(self) -> i32 {
        if !self.is_valid() {
            return 0;
        }
        let n = self.numerator as i64;
        let d = self.denominator as i64;
        (2 * n + d).div_euclid(2 * d) as i32
    }
}

impl Default for Fraction {
    fn default() -> Fraction {
        Fraction {
            numerator: 0,
            denominator: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_case::test_case;

    #[test]
    fn validity() {
        assert!(Fraction::default().is_valid());
        assert!(!Fraction::new(1, 0).is_valid());
        assert!(!Fraction::new_u32(u32::MAX, 1).is_valid());
        assert!(Fraction::new_u32(50, 1).is_valid());
        // Negative denominators normalize into the numerator.
        let f = Fraction::new(3, -2);
        assert_eq!(f, Fraction::new(-3, 2));
    }

    #[test_case(7, 2, 3, 4, 4; "positive half rounds up")]
    #[test_case(-7, 2, -4, -3, -3; "negative half")]
    #[test_case(6, 3, 2, 2, 2; "integral")]
    #[test_case(-1, 3, -1, 0, 0; "small negative")]
    #[test_case(99, 2, 49, 50, 50; "clap center")]
    fn rounding(n: i32, d: i32, down: i32, up: i32, nearest: i32) {
        let f = Fraction::new(n, d);
        assert_eq!(f.round_down(), down);
        assert_eq!(f.round_up(), up);
        assert_eq!(f.round(), nearest);
    }

    #[test_case(1, 3; "one third")]
    #[test_case(-5, 7; "negative five sevenths")]
    #[test_case(123456, 789; "large positive")]
    #[test_case(-123456, 789; "large negative")]
    fn rounding_laws(n: i32, d: i32) {
        let f = Fraction::new(n, d);
        assert!(f.round_down() <= f.round());
        assert!(f.round() <= f.round_up());
        let gap = f.round_up() - f.round_down();
        assert!(gap == 0 || gap == 1);
    }

    #[test]
    fn arithmetic() {
        let half = Fraction::new(1, 2);
        assert_eq!(half.add(half), Fraction::new(1, 1));
        assert_eq!(half.sub(Fraction::new(1, 4)), Fraction::new(1, 4));
        assert_eq!(half.add_i32(2), Fraction::new(5, 2));
        assert_eq!(half.sub_i32(1), Fraction::new(-1, 2));
        assert_eq!(Fraction::new(49, 1).div_i32(2), Fraction::new(49, 2));
    }

    #[test]
    fn overflow_saturates_to_invalid() {
        let big = Fraction::new(i32::MAX, 1);
        assert!(!big.add(big).is_valid());
        // The invalid value is sticky.
        assert!(!big.add(big).add_i32(1).is_valid());
        assert!(!Fraction::new(1, 2).div_i32(0).is_valid());
        // Reduction keeps representable results valid.
        assert_eq!(
            Fraction::new(i32::MAX, 2).add(Fraction::new(i32::MAX, 2)),
            Fraction::new(i32::MAX, 1)
        );
    }
}
