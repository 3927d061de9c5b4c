use alloy_primitives::U256;
use alloy_primitives::utils::format_units;
use serde::{Serialize, Serializer};
use std::fmt;

/// A raw on-chain token quantity together with the token's decimals.
///
/// Displays as `raw / 10^decimals` without rounding for any 256-bit value or any
/// `u8` decimals. Trailing zeros of the fraction are dropped but one digit is
/// always kept (`1.0`, not `1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    pub raw: U256,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn normalized(&self) -> String {
        let formatted =
            format_units(self.raw, self.decimals).unwrap_or_else(|_| self.shifted());
        trim_fraction(&formatted)
    }

    /// `format_units` only knows units up to 77; past that, move the decimal
    /// point on the digit string directly.
    fn shifted(&self) -> String {
        let digits = self.raw.to_string();
        let decimals = self.decimals as usize;
        let padded = if digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (whole, fraction) = padded.split_at(padded.len() - decimals);
        format!("{whole}.{fraction}")
    }
}

fn trim_fraction(formatted: &str) -> String {
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            let fraction = if fraction.is_empty() { "0" } else { fraction };
            format!("{whole}.{fraction}")
        }
        None => format!("{formatted}.0"),
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(raw: &str, decimals: u8) -> String {
        TokenAmount::new(U256::from_str(raw).unwrap(), decimals).to_string()
    }

    #[test]
    fn one_whole_token_with_eighteen_decimals() {
        assert_eq!(amount("1000000000000000000", 18), "1.0");
    }

    #[test]
    fn keeps_significant_fraction_digits() {
        assert_eq!(amount("1234500", 3), "1234.5");
        assert_eq!(amount("5", 2), "0.05");
        assert_eq!(amount("123456789", 9), "0.123456789");
    }

    #[test]
    fn zero_supply_and_zero_decimals() {
        assert_eq!(amount("0", 18), "0.0");
        assert_eq!(amount("42", 0), "42.0");
    }

    #[test]
    fn max_u256_is_not_rounded() {
        let max = U256::MAX.to_string();
        let rendered = TokenAmount::new(U256::MAX, 18).to_string();

        assert_eq!(rendered.replace('.', ""), max);
        assert_eq!(
            rendered,
            "115792089237316195423570985008687907853269984665640564039457.584007913129639935"
        );
    }

    #[test]
    fn decimals_beyond_u256_range_shift_without_overflow() {
        let rendered = amount("7", 255);
        assert!(rendered.starts_with("0."));
        assert!(rendered.ends_with('7'));
        assert_eq!(rendered.len(), 2 + 255);
    }

    #[test]
    fn largest_unit_and_first_fallback_agree() {
        assert_eq!(amount("7", 77), format!("0.{}7", "0".repeat(76)));
        assert_eq!(amount("7", 78), format!("0.{}7", "0".repeat(77)));
        assert_eq!(amount("70", 78), format!("0.{}7", "0".repeat(76)));
    }
}
