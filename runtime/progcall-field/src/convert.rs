///
/// Generic Decimal Moves
///
/// Fields whose encoding has no dedicated codec (edited pictures,
/// alphanumeric text, groups) are converted through a 64-bit binary
/// intermediate that carries the same implied scale as the field. Reading
/// such a field yields its value multiplied by `10^scale`; writing renders a
/// scaled integer back as text.
///
/// ## Reading
///
/// Digits are collected left to right. A `.` starts the fractional part;
/// fractional digits beyond the field scale are dropped and missing ones are
/// padded with zeros. A `-` anywhere, or a trailing `CR`/`DB`, marks the
/// value negative.
///
/// ## Writing
///
/// Edited and numeric targets are right-justified with leading spaces, a
/// leading `-` for negatives and a `.` before the last `scale` digits.
/// Alphanumeric and group targets receive the bare digits left-justified and
/// space-padded, the way a numeric-to-text move drops sign and point.
///

use crate::field::FieldType;

/// Decimal value as parsed from text: magnitude already aligned to the
/// requested scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledValue {
    pub magnitude: u64,
    pub negative: bool,
}

impl ScaledValue {
    pub fn to_i64(self) -> i64 {
        if self.negative {
            (self.magnitude as i64).wrapping_neg()
        } else {
            self.magnitude as i64
        }
    }
}

fn pow10(exp: u32) -> u64 {
    10u64.saturating_pow(exp)
}

pub fn parse_scaled(data: &[u8], scale: i32) -> ScaledValue {
    let mut int_part: u64 = 0;
    let mut frac_part: u64 = 0;
    let mut frac_digits: u32 = 0;
    let mut in_fraction = false;
    let mut negative = false;
    let want = scale.max(0) as u32;

    for &b in data {
        match b {
            b'0'..=b'9' => {
                let digit = u64::from(b - b'0');
                if in_fraction {
                    if frac_digits < want {
                        frac_part = frac_part.wrapping_mul(10).wrapping_add(digit);
                        frac_digits += 1;
                    }
                } else {
                    int_part = int_part.wrapping_mul(10).wrapping_add(digit);
                }
            }
            b'.' => in_fraction = true,
            b'-' => negative = true,
            _ => {}
        }
    }

    let trimmed = trim_trailing_spaces(data);
    if trimmed.ends_with(b"CR") || trimmed.ends_with(b"DB") {
        negative = true;
    }

    let magnitude = if scale >= 0 {
        int_part
            .wrapping_mul(pow10(want))
            .wrapping_add(frac_part.wrapping_mul(pow10(want - frac_digits)))
    } else {
        int_part / pow10(scale.unsigned_abs())
    };

    ScaledValue {
        magnitude,
        negative,
    }
}

fn trim_trailing_spaces(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &data[..end]
}

fn render_digits(magnitude: u64, scale: i32) -> Vec<u8> {
    let mut digits = magnitude.to_string().into_bytes();
    if scale > 0 {
        let scale = scale as usize;
        while digits.len() <= scale {
            digits.insert(0, b'0');
        }
        digits.insert(digits.len() - scale, b'.');
    }
    digits
}

/// Renders a scaled integer into `data` according to the target kind.
pub fn store_scaled(value: ScaledValue, scale: i32, kind: FieldType, data: &mut [u8]) {
    if data.is_empty() {
        return;
    }

    if kind.is_text() {
        let digits = value.magnitude.to_string().into_bytes();
        let n = digits.len().min(data.len());
        data[..n].copy_from_slice(&digits[..n]);
        data[n..].fill(b' ');
        return;
    }

    let mut text = render_digits(value.magnitude, scale);
    if value.negative && value.magnitude != 0 {
        text.insert(0, b'-');
    }

    let len = data.len();
    if text.len() >= len {
        data.copy_from_slice(&text[text.len() - len..]);
    } else {
        let pad = len - text.len();
        data[..pad].fill(b' ');
        data[pad..].copy_from_slice(&text);
    }
}

pub fn store_s64(val: i64, scale: i32, kind: FieldType, data: &mut [u8]) {
    let value = ScaledValue {
        magnitude: val.unsigned_abs(),
        negative: val < 0,
    };
    store_scaled(value, scale, kind, data);
}

pub fn store_u64(val: u64, scale: i32, kind: FieldType, data: &mut [u8]) {
    let value = ScaledValue {
        magnitude: val,
        negative: false,
    };
    store_scaled(value, scale, kind, data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scaled_aligns_fraction() {
        assert_eq!(parse_scaled(b"  123.45", 2).to_i64(), 12345);
        assert_eq!(parse_scaled(b"123.4", 2).to_i64(), 12340);
        assert_eq!(parse_scaled(b"123.456", 2).to_i64(), 12345);
        assert_eq!(parse_scaled(b"42", 0).to_i64(), 42);
    }

    #[test]
    fn test_parse_scaled_sign_markers() {
        assert_eq!(parse_scaled(b"-5.00", 2).to_i64(), -500);
        assert_eq!(parse_scaled(b"12.00CR ", 2).to_i64(), -1200);
        assert_eq!(parse_scaled(b"12.00DB", 2).to_i64(), -1200);
    }

    #[test]
    fn test_parse_scaled_beyond_u64_digits_wraps() {
        assert_eq!(parse_scaled(b"0.000", 25).to_i64(), 0);
        let wide = parse_scaled(b"1.5 ", 20);
        assert!(!wide.negative);
        let long = parse_scaled(b"-9.9999999999999999999999999", 30);
        assert!(long.negative);
    }

    #[test]
    fn test_store_edited_right_justified() {
        let mut buf = [0u8; 8];
        store_s64(-12345, 2, FieldType::Edited, &mut buf);
        assert_eq!(&buf, b" -123.45");
    }

    #[test]
    fn test_store_small_scaled_value_pads_zeros() {
        let mut buf = [0u8; 5];
        store_s64(7, 2, FieldType::Edited, &mut buf);
        assert_eq!(&buf, b" 0.07");
    }

    #[test]
    fn test_store_text_left_justified() {
        let mut buf = [0u8; 6];
        store_u64(314, 0, FieldType::Alphanumeric, &mut buf);
        assert_eq!(&buf, b"314   ");
    }

    #[test]
    fn test_store_truncates_high_order() {
        let mut buf = [0u8; 3];
        store_s64(98765, 0, FieldType::Edited, &mut buf);
        assert_eq!(&buf, b"765");
    }
}
