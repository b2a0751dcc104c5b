//! Resource quantity arithmetic
//!
//! Quantities follow the Kubernetes convention: decimal-SI for CPU
//! (millicores) and object counts, binary-SI for memory and storage. A value
//! parses from forms like `"100m"`, `"2"`, `"1.5Gi"` or `"500M"` and renders
//! back in the largest suffix that divides it evenly, so `8000m` prints as
//! `8` and `2048Mi` prints as `2Gi`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a quantity string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity {value:?}")]
    Invalid { value: String },

    #[error("unknown quantity suffix {suffix:?} in {value:?}")]
    UnknownSuffix { suffix: String, value: String },

    #[error("quantity {value:?} overflows")]
    Overflow { value: String },
}

/// Suffix family a quantity was written in; sums keep the family of their
/// first non-zero operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// Millicores, plain integers, k / M / G / T.
    DecimalSi,
    /// Ki / Mi / Gi / Ti.
    BinarySi,
}

/// A fixed-point resource quantity, stored as milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quantity {
    millis: i64,
    format: Format,
}

const DECIMAL_SUFFIXES: &[(&str, i64)] = &[
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

const BINARY_SUFFIXES: &[(&str, i64)] = &[
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

impl Quantity {
    pub const fn zero() -> Self {
        Self {
            millis: 0,
            format: Format::DecimalSi,
        }
    }

    /// Whole decimal units, e.g. `from_units(8)` is eight CPUs or eight pods.
    pub const fn from_units(units: i64) -> Self {
        Self {
            millis: units * 1000,
            format: Format::DecimalSi,
        }
    }

    /// Decimal milli-units, e.g. `from_millis(250)` is `250m` CPU.
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            millis,
            format: Format::DecimalSi,
        }
    }

    /// Whole binary units (bytes for memory and storage).
    pub const fn from_binary_units(units: i64) -> Self {
        Self {
            millis: units * 1000,
            format: Format::BinarySi,
        }
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Parse a quantity string such as `"100m"`, `"2"`, `"1.5Gi"`.
    pub fn parse(value: &str) -> Result<Self, QuantityError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(QuantityError::Empty);
        }

        let split = value
            .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
            .unwrap_or(value.len());
        let (mantissa, suffix) = value.split_at(split);
        if mantissa.is_empty() {
            return Err(QuantityError::Invalid {
                value: value.to_string(),
            });
        }

        let (multiplier_millis, format) = match suffix {
            "" => (1000, Format::DecimalSi),
            "m" => (1, Format::DecimalSi),
            _ => {
                if let Some((_, mult)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
                    (mult * 1000, Format::BinarySi)
                } else if let Some((_, mult)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix)
                {
                    (mult * 1000, Format::DecimalSi)
                } else {
                    return Err(QuantityError::UnknownSuffix {
                        suffix: suffix.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        };

        let millis = parse_fixed_point(mantissa, multiplier_millis).ok_or_else(|| {
            QuantityError::Invalid {
                value: value.to_string(),
            }
        })?;
        let millis = i64::try_from(millis).map_err(|_| QuantityError::Overflow {
            value: value.to_string(),
        })?;

        Ok(Self { millis, format })
    }

    /// Checked addition; the result keeps the format of the first non-zero
    /// operand so that summed memory stays binary-SI.
    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        let millis = self.millis.checked_add(other.millis)?;
        let format = if self.is_zero() {
            other.format
        } else {
            self.format
        };
        Some(Quantity { millis, format })
    }

    /// Addition that saturates at `i64::MAX` milli-units.
    pub fn saturating_add(&self, other: &Quantity) -> Quantity {
        self.checked_add(other).unwrap_or(Quantity {
            millis: i64::MAX,
            format: self.format,
        })
    }
}

/// Parse `int[.frac]` scaled by `multiplier_millis`, without going through
/// floating point.
fn parse_fixed_point(mantissa: &str, multiplier_millis: i64) -> Option<i128> {
    let (negative, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    if digits.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let int_value: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut result = int_value.checked_mul(multiplier_millis as i128)?;

    if !frac_part.is_empty() {
        let frac_value: i128 = frac_part.parse().ok()?;
        let scale = 10i128.checked_pow(frac_part.len() as u32)?;
        result = result.checked_add(frac_value.checked_mul(multiplier_millis as i128)? / scale)?;
    }

    Some(if negative { -result } else { result })
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis % 1000 != 0 {
            return write!(f, "{}m", self.millis);
        }
        let units = self.millis / 1000;
        if units == 0 {
            return f.write_str("0");
        }
        let suffixes = match self.format {
            Format::BinarySi => BINARY_SUFFIXES,
            Format::DecimalSi => DECIMAL_SUFFIXES,
        };
        for (suffix, mult) in suffixes {
            if units % mult == 0 {
                return write!(f, "{}{}", units / mult, suffix);
            }
        }
        write!(f, "{units}")
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis.cmp(&other.millis)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::zero()
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Quantity::parse(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cpu_forms() {
        assert_eq!(Quantity::parse("100m").unwrap().millis(), 100);
        assert_eq!(Quantity::parse("2").unwrap().millis(), 2000);
        assert_eq!(Quantity::parse("1.5").unwrap().millis(), 1500);
        assert_eq!(Quantity::parse("0.5").unwrap().millis(), 500);
    }

    #[test]
    fn parses_memory_forms() {
        assert_eq!(Quantity::parse("1Ki").unwrap().millis(), 1024 * 1000);
        assert_eq!(
            Quantity::parse("2Gi").unwrap().millis(),
            2 * (1i64 << 30) * 1000
        );
        assert_eq!(
            Quantity::parse("500M").unwrap().millis(),
            500_000_000i64 * 1000
        );
        assert_eq!(
            Quantity::parse("1.5Gi").unwrap().millis(),
            3 * (1i64 << 29) * 1000
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("abc").is_err());
        assert!(Quantity::parse("10Q").is_err());
        assert!(Quantity::parse("1.2.3").is_err());
    }

    #[test]
    fn display_uses_largest_even_suffix() {
        assert_eq!(Quantity::parse("8").unwrap().to_string(), "8");
        assert_eq!(Quantity::parse("8000m").unwrap().to_string(), "8");
        assert_eq!(Quantity::parse("100m").unwrap().to_string(), "100m");
        assert_eq!(Quantity::parse("2048Mi").unwrap().to_string(), "2Gi");
        assert_eq!(Quantity::parse("500M").unwrap().to_string(), "500M");
        assert_eq!(Quantity::zero().to_string(), "0");
    }

    #[test]
    fn ordering_ignores_format() {
        let gi = Quantity::parse("1Gi").unwrap();
        let m = Quantity::parse("1000M").unwrap();
        assert!(gi > m);
        assert!(Quantity::parse("500m").unwrap() < Quantity::parse("1").unwrap());
    }

    #[test]
    fn addition_keeps_first_nonzero_format() {
        let sum = Quantity::zero()
            .checked_add(&Quantity::parse("1Gi").unwrap())
            .unwrap()
            .checked_add(&Quantity::parse("1Gi").unwrap())
            .unwrap();
        assert_eq!(sum.to_string(), "2Gi");

        let cpu = Quantity::parse("250m")
            .unwrap()
            .checked_add(&Quantity::parse("750m").unwrap())
            .unwrap();
        assert_eq!(cpu.to_string(), "1");
    }

    #[test]
    fn serde_round_trip() {
        let q = Quantity::parse("1500m").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, "\"1500m\"");
        let back: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }
}
