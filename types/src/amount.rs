//! Currency-aware amounts.
//!
//! An [`Amount`] is a signed, arbitrary-precision integer count of base units
//! tagged with the [`Unit`] it was created in. Arithmetic and comparison are
//! defined only between compatible units and always operate on the base-unit
//! integer, so no precision is lost when switching denominations.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::Unit;

/// A signed quantity of some currency.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Amount {
    value: BigInt,
    unit: Unit,
}

fn scale(decimals: u8) -> BigInt {
    num_traits::pow(BigInt::from(10u8), decimals as usize)
}

/// Parse an unsigned decimal string with at most `decimals` fractional digits
/// into an integer count of base units.
fn parse_decimal(s: &str, decimals: u8) -> Option<BigInt> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.len() > decimals as usize {
        return None;
    }

    let int_value = if int_part.is_empty() {
        BigInt::zero()
    } else {
        int_part.parse::<BigInt>().ok()?
    };
    let mut padded = frac_trimmed.to_string();
    while padded.len() < decimals as usize {
        padded.push('0');
    }
    let frac_value = if padded.is_empty() {
        BigInt::zero()
    } else {
        padded.parse::<BigInt>().ok()?
    };
    Some(int_value * scale(decimals) + frac_value)
}

impl Amount {
    /// Create from a count of base units.
    pub fn from_base_units(value: impl Into<BigInt>, unit: Unit) -> Self {
        Self {
            value: value.into(),
            unit,
        }
    }

    /// Create from a floating point value expressed in `unit`.
    ///
    /// The value is rounded to the unit's decimal precision. Non-finite
    /// input yields `None`.
    pub fn create_f64(value: f64, unit: Unit) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let rendered = format!("{:.*}", unit.decimals() as usize, value.abs());
        let magnitude = parse_decimal(&rendered, unit.decimals())?;
        let value = if value.is_sign_negative() {
            -magnitude
        } else {
            magnitude
        };
        Some(Self { value, unit })
    }

    /// Create from an integer expressed in `unit`.
    pub fn create_i64(value: i64, unit: Unit) -> Self {
        let value = BigInt::from(value) * scale(unit.decimals());
        Self { value, unit }
    }

    /// Create from a string expressed in `unit`.
    ///
    /// Accepts decimal (`"12.5"`) or `0x`-prefixed hexadecimal integers.
    /// Returns `None` when the string is malformed or carries more fractional
    /// digits than the unit supports.
    pub fn create_string(value: &str, is_negative: bool, unit: Unit) -> Option<Self> {
        let trimmed = value.trim();
        let magnitude = if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            let integer = BigInt::parse_bytes(hex.as_bytes(), 16)?;
            if integer.is_negative() {
                return None;
            }
            integer * scale(unit.decimals())
        } else {
            parse_decimal(trimmed, unit.decimals())?
        };
        let value = if is_negative { -magnitude } else { magnitude };
        Some(Self { value, unit })
    }

    /// The unit this amount was created in.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// The signed count of base units.
    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn currency(&self) -> &crate::Currency {
        self.unit.currency()
    }

    pub fn has_currency(&self, currency: &crate::Currency) -> bool {
        self.unit.has_currency(currency)
    }

    pub fn is_compatible(&self, other: &Amount) -> bool {
        self.unit.is_compatible(&other.unit)
    }

    pub fn is_negative(&self) -> bool {
        self.value.sign() == Sign::Minus
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn negate(&self) -> Self {
        Self {
            value: -self.value.clone(),
            unit: self.unit.clone(),
        }
    }

    /// Sum in `self`'s unit, or `None` if the units are incompatible.
    pub fn add(&self, other: &Amount) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        Some(Self {
            value: &self.value + &other.value,
            unit: self.unit.clone(),
        })
    }

    /// Difference in `self`'s unit, or `None` if the units are incompatible.
    pub fn sub(&self, other: &Amount) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        Some(Self {
            value: &self.value - &other.value,
            unit: self.unit.clone(),
        })
    }

    /// Re-express the same quantity in another compatible unit.
    pub fn convert(&self, unit: &Unit) -> Option<Self> {
        if !self.unit.is_compatible(unit) {
            return None;
        }
        Some(Self {
            value: self.value.clone(),
            unit: unit.clone(),
        })
    }

    /// The quantity as a float in `unit`.
    pub fn as_f64(&self, unit: &Unit) -> Option<f64> {
        if !self.unit.is_compatible(unit) {
            return None;
        }
        let value = self.value.to_f64()?;
        Some(value / 10f64.powi(unit.decimals() as i32))
    }

    /// Decimal rendering in `unit`, fractional trailing zeros removed.
    pub fn to_string_as_unit(&self, unit: &Unit) -> Option<String> {
        if !self.unit.is_compatible(unit) {
            return None;
        }
        let magnitude = self.value.abs();
        let divisor = scale(unit.decimals());
        let int_part = &magnitude / &divisor;
        let frac_part = &magnitude % &divisor;

        let mut rendered = int_part.to_string();
        if !frac_part.is_zero() {
            let digits = frac_part.to_string();
            let padding = unit.decimals() as usize - digits.len();
            let frac = format!("{}{}", "0".repeat(padding), digits);
            rendered.push('.');
            rendered.push_str(frac.trim_end_matches('0'));
        }
        if self.is_negative() {
            rendered.insert(0, '-');
        }
        Some(rendered)
    }

    /// Integer rendering of the base-unit count in `radix`, with `prefix`
    /// placed after any sign. `None` unless `radix` is within `2..=36`.
    pub fn to_string_with_base(&self, radix: u32, prefix: &str) -> Option<String> {
        if !(2..=36).contains(&radix) {
            return None;
        }
        let digits = self.value.abs().to_str_radix(radix);
        Some(if self.is_negative() {
            format!("-{prefix}{digits}")
        } else {
            format!("{prefix}{digits}")
        })
    }

    /// Ordering of the base-unit counts, `None` if incompatible.
    pub fn compare(&self, other: &Amount) -> Option<Ordering> {
        if !self.is_compatible(other) {
            return None;
        }
        Some(self.value.cmp(&other.value))
    }

    /// Scale by a non-negative factor, rounding to the nearest base unit.
    pub fn mul_f64(&self, factor: f64) -> Option<Self> {
        if !factor.is_finite() || factor < 0.0 {
            return None;
        }
        const PRECISION: u32 = 1_000_000;
        let scaled = (factor * PRECISION as f64).round().to_u64()?;
        let product = &self.value * BigInt::from(scaled);
        let half = BigInt::from(PRECISION / 2);
        let rounded = if product.is_negative() {
            (product - half) / BigInt::from(PRECISION)
        } else {
            (product + half) / BigInt::from(PRECISION)
        };
        Some(Self {
            value: rounded,
            unit: self.unit.clone(),
        })
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string_as_unit(&self.unit) {
            Some(s) => write!(f, "{} {}", s, self.unit.symbol()),
            None => write!(f, "{} (base units)", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Currency;

    fn btc() -> Currency {
        Currency::new("bitcoin-mainnet:__native__", "Bitcoin", "btc", "native", None)
    }

    fn sat() -> Unit {
        Unit::base(btc(), "bitcoin-mainnet:__native__:sat", "Satoshi", "SAT")
    }

    fn coin() -> Unit {
        Unit::derived(&sat(), "bitcoin-mainnet:__native__:btc", "Bitcoin", "BTC", 8)
    }

    #[test]
    fn create_in_sub_unit_scales_to_base() {
        let a = Amount::create_f64(1.5, coin()).unwrap();
        assert_eq!(a.value(), &BigInt::from(150_000_000u64));
        assert_eq!(a.unit(), &coin());

        let b = Amount::create_i64(2, coin());
        assert_eq!(b.value(), &BigInt::from(200_000_000u64));
    }

    #[test]
    fn create_string_decimal_and_hex() {
        let a = Amount::create_string("0.00000001", false, coin()).unwrap();
        assert_eq!(a.value(), &BigInt::from(1));

        let b = Amount::create_string("0x10", false, sat()).unwrap();
        assert_eq!(b.value(), &BigInt::from(16));

        let c = Amount::create_string("25", true, sat()).unwrap();
        assert!(c.is_negative());
        assert_eq!(c.value(), &BigInt::from(-25));
    }

    #[test]
    fn create_string_rejects_excess_precision_and_garbage() {
        assert!(Amount::create_string("0.000000001", false, coin()).is_none());
        assert!(Amount::create_string("1.5", false, sat()).is_none());
        assert!(Amount::create_string("abc", false, sat()).is_none());
        assert!(Amount::create_string("", false, sat()).is_none());
        // trailing zeros beyond precision are harmless
        assert!(Amount::create_string("1.000000000", false, coin()).is_some());
    }

    #[test]
    fn create_f64_rejects_non_finite() {
        assert!(Amount::create_f64(f64::NAN, sat()).is_none());
        assert!(Amount::create_f64(f64::INFINITY, sat()).is_none());
    }

    #[test]
    fn add_and_sub_require_compatible_units() {
        let eth = Currency::new("ethereum-mainnet:__native__", "Ethereum", "eth", "native", None);
        let wei = Unit::base(eth, "eth:wei", "Wei", "WEI");

        let a = Amount::create_i64(10, sat());
        let b = Amount::create_i64(1, coin());
        let w = Amount::create_i64(1, wei);

        let sum = a.add(&b).unwrap();
        assert_eq!(sum.value(), &BigInt::from(100_000_010u64));
        assert_eq!(sum.unit(), &sat());
        assert!(a.add(&w).is_none());
        assert!(a.sub(&w).is_none());
    }

    #[test]
    fn comparison_normalizes_units() {
        let a = Amount::create_i64(100_000_000, sat());
        let b = Amount::create_i64(1, coin());
        assert_eq!(a, b);
        assert_eq!(a.compare(&b), Some(Ordering::Equal));

        let c = Amount::create_f64(0.5, coin()).unwrap();
        assert!(c < a);
    }

    #[test]
    fn renders_in_requested_unit() {
        let a = Amount::create_i64(123_450_000, sat());
        assert_eq!(a.to_string_as_unit(&coin()).unwrap(), "1.2345");
        assert_eq!(a.to_string_as_unit(&sat()).unwrap(), "123450000");
        assert_eq!(a.negate().to_string_as_unit(&coin()).unwrap(), "-1.2345");
        assert_eq!(a.to_string_with_base(16, "0x").unwrap(), "0x75bb290");
        assert_eq!(a.negate().to_string_with_base(10, "").unwrap(), "-123450000");
    }

    #[test]
    fn unsupported_radix_is_rejected() {
        let a = Amount::create_i64(42, sat());
        assert_eq!(a.to_string_with_base(1, ""), None);
        assert_eq!(a.to_string_with_base(37, ""), None);
        assert_eq!(a.to_string_with_base(36, "").as_deref(), Some("16"));
    }

    #[test]
    fn convert_keeps_quantity() {
        let a = Amount::create_i64(5, coin());
        let converted = a.convert(&sat()).unwrap();
        assert_eq!(converted.unit(), &sat());
        assert_eq!(converted, a);
        assert_eq!(converted.as_f64(&coin()), Some(5.0));
    }

    #[test]
    fn mul_f64_rounds_to_base_unit() {
        let price = Amount::create_i64(3, sat());
        let fee = price.mul_f64(2.5).unwrap();
        assert_eq!(fee.value(), &BigInt::from(8));
        assert!(price.mul_f64(-1.0).is_none());
    }

    #[test]
    fn zero_and_sign() {
        let zero = Amount::create_i64(0, sat());
        assert!(zero.is_zero());
        assert!(!zero.is_negative());
        assert!(zero.negate().is_zero());
    }
}
