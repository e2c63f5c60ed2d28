///
/// Field Codecs
///
/// Byte-level encoders and decoders for the numeric field encodings a
/// called program may declare:
///
/// - **Display**: one ASCII digit per byte. A negative value is carried as an
///   overpunched last byte (`p`..`y` for 0..9) or a separate `-` character.
/// - **Binary**: two's complement integer of 1 to 8 bytes, either big-endian
///   or host order.
/// - **Packed**: two decimal digits per byte, the low nibble of the last byte
///   holds the sign (`C`/`F` positive, `D` negative).
/// - **Float/Double**: host-order IEEE 754 single and double precision.
///
/// All routines work on plain slices and never panic on short or long input:
/// decoders read what is there, encoders truncate high-order digits that do
/// not fit.
///

/// Byte order of a binary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Native,
}

const OVERPUNCH_BASE: u8 = b'p';
const PACKED_POSITIVE: u8 = 0x0C;
const PACKED_NEGATIVE: u8 = 0x0D;
const PACKED_UNSIGNED: u8 = 0x0F;

fn parse_display(data: &[u8]) -> (u64, bool) {
    let mut val: u64 = 0;
    let mut negative = false;
    let last = data.len().saturating_sub(1);

    for (i, &b) in data.iter().enumerate() {
        match b {
            b'0'..=b'9' => {
                val = val.wrapping_mul(10).wrapping_add(u64::from(b - b'0'));
            }
            b'p'..=b'y' if i == last => {
                val = val.wrapping_mul(10).wrapping_add(u64::from(b - OVERPUNCH_BASE));
                negative = true;
            }
            b'-' => negative = true,
            _ => {}
        }
    }

    (val, negative)
}

pub fn get_s64_display(data: &[u8]) -> i64 {
    let (val, negative) = parse_display(data);
    if negative {
        (val as i64).wrapping_neg()
    } else {
        val as i64
    }
}

pub fn get_u64_display(data: &[u8]) -> u64 {
    parse_display(data).0
}

/// Writes `magnitude` right-aligned and zero-filled. The sign is overpunched
/// into the last byte only when the field is signed.
pub fn put_display(magnitude: u64, negative: bool, signed: bool, data: &mut [u8]) {
    let mut rest = magnitude;
    for byte in data.iter_mut().rev() {
        *byte = b'0' + (rest % 10) as u8;
        rest /= 10;
    }

    if negative && signed {
        if let Some(last) = data.last_mut() {
            *last += OVERPUNCH_BASE - b'0';
        }
    }
}

pub fn put_s64_display(val: i64, signed: bool, data: &mut [u8]) {
    put_display(val.unsigned_abs(), val < 0, signed, data);
}

pub fn put_u64_display(val: u64, data: &mut [u8]) {
    put_display(val, false, false, data);
}

fn binary_window(data: &[u8], endian: Endian) -> &[u8] {
    if data.len() <= 8 {
        return data;
    }
    match (endian, cfg!(target_endian = "little")) {
        (Endian::Big, _) | (Endian::Native, false) => &data[data.len() - 8..],
        (Endian::Native, true) => &data[..8],
    }
}

fn read_unsigned(data: &[u8], endian: Endian) -> u64 {
    let bytes = binary_window(data, endian);
    let big = match endian {
        Endian::Big => true,
        Endian::Native => cfg!(target_endian = "big"),
    };

    let mut val: u64 = 0;
    if big {
        for &b in bytes {
            val = (val << 8) | u64::from(b);
        }
    } else {
        for &b in bytes.iter().rev() {
            val = (val << 8) | u64::from(b);
        }
    }
    val
}

pub fn get_u64_binary(data: &[u8], endian: Endian) -> u64 {
    read_unsigned(data, endian)
}

pub fn get_s64_binary(data: &[u8], endian: Endian) -> i64 {
    let width = data.len().min(8);
    if width == 0 {
        return 0;
    }
    let raw = read_unsigned(data, endian);
    let shift = 64 - (width as u32) * 8;
    ((raw << shift) as i64) >> shift
}

/// Stores the low-order bytes of `val`; bytes beyond the eighth are zeroed.
pub fn put_binary(val: u64, data: &mut [u8], endian: Endian) {
    let big = match endian {
        Endian::Big => true,
        Endian::Native => cfg!(target_endian = "big"),
    };
    let len = data.len();

    let mut rest = val;
    for i in 0..len {
        let idx = if big { len - 1 - i } else { i };
        data[idx] = if i < 8 { (rest & 0xFF) as u8 } else { 0 };
        rest >>= 8;
    }
}

pub fn put_s64_binary(val: i64, data: &mut [u8], endian: Endian) {
    put_binary(val as u64, data, endian);

    // sign-fill wide fields
    if val < 0 && data.len() > 8 {
        let len = data.len();
        let big = match endian {
            Endian::Big => true,
            Endian::Native => cfg!(target_endian = "big"),
        };
        let pad = if big { 0..len - 8 } else { 8..len };
        data[pad].fill(0xFF);
    }
}

fn parse_packed(data: &[u8]) -> (u64, bool) {
    let Some((&last, body)) = data.split_last() else {
        return (0, false);
    };

    let mut val: u64 = 0;
    for &b in body {
        val = val.wrapping_mul(10).wrapping_add(u64::from(b >> 4));
        val = val.wrapping_mul(10).wrapping_add(u64::from(b & 0x0F));
    }
    val = val.wrapping_mul(10).wrapping_add(u64::from(last >> 4));

    (val, last & 0x0F == PACKED_NEGATIVE)
}

pub fn get_s64_packed(data: &[u8]) -> i64 {
    let (val, negative) = parse_packed(data);
    if negative {
        (val as i64).wrapping_neg()
    } else {
        val as i64
    }
}

pub fn get_u64_packed(data: &[u8]) -> u64 {
    parse_packed(data).0
}

pub fn put_packed(magnitude: u64, negative: bool, signed: bool, data: &mut [u8]) {
    let Some((last, body)) = data.split_last_mut() else {
        return;
    };

    let sign = match (signed, negative) {
        (false, _) => PACKED_UNSIGNED,
        (true, true) => PACKED_NEGATIVE,
        (true, false) => PACKED_POSITIVE,
    };

    let mut rest = magnitude;
    *last = (((rest % 10) as u8) << 4) | sign;
    rest /= 10;

    for byte in body.iter_mut().rev() {
        let low = (rest % 10) as u8;
        rest /= 10;
        let high = (rest % 10) as u8;
        rest /= 10;
        *byte = (high << 4) | low;
    }
}

pub fn put_s64_packed(val: i64, signed: bool, data: &mut [u8]) {
    put_packed(val.unsigned_abs(), val < 0, signed, data);
}

pub fn put_u64_packed(val: u64, signed: bool, data: &mut [u8]) {
    put_packed(val, false, signed, data);
}

pub fn get_float(data: &[u8]) -> f32 {
    match data.get(..4) {
        Some(bytes) => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        None => 0.0,
    }
}

pub fn get_double(data: &[u8]) -> f64 {
    match data.get(..8) {
        Some(bytes) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            f64::from_ne_bytes(raw)
        }
        None => 0.0,
    }
}

pub fn put_float(val: f32, data: &mut [u8]) {
    if let Some(dest) = data.get_mut(..4) {
        dest.copy_from_slice(&val.to_ne_bytes());
    }
}

pub fn put_double(val: f64, data: &mut [u8]) {
    if let Some(dest) = data.get_mut(..8) {
        dest.copy_from_slice(&val.to_ne_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_plain_digits() {
        assert_eq!(get_s64_display(b"00042"), 42);
        assert_eq!(get_u64_display(b"12345"), 12345);
    }

    #[test]
    fn test_display_overpunch_negative() {
        // 'r' is an overpunched 2
        assert_eq!(get_s64_display(b"0001r"), -12);
        assert_eq!(get_u64_display(b"0001r"), 12);
    }

    #[test]
    fn test_display_separate_sign() {
        assert_eq!(get_s64_display(b"-0007"), -7);
        assert_eq!(get_s64_display(b"0007+"), 7);
    }

    #[test]
    fn test_put_display_truncates_high_order() {
        let mut buf = [0u8; 3];
        put_s64_display(12345, true, &mut buf);
        assert_eq!(&buf, b"345");
    }

    #[test]
    fn test_put_display_negative_signed() {
        let mut buf = [0u8; 4];
        put_s64_display(-42, true, &mut buf);
        assert_eq!(&buf, b"004r");
        assert_eq!(get_s64_display(&buf), -42);
    }

    #[test]
    fn test_put_display_negative_unsigned_drops_sign() {
        let mut buf = [0u8; 4];
        put_s64_display(-42, false, &mut buf);
        assert_eq!(&buf, b"0042");
    }

    #[test]
    fn test_binary_big_endian() {
        assert_eq!(get_u64_binary(&[0x01, 0x02], Endian::Big), 0x0102);
        assert_eq!(get_s64_binary(&[0xFF, 0xFE], Endian::Big), -2);
        assert_eq!(get_s64_binary(&[0x7F, 0xFF], Endian::Big), 0x7FFF);
    }

    #[test]
    fn test_binary_native_matches_host_order() {
        let bytes = 0x1234_5678_i32.to_ne_bytes();
        assert_eq!(get_s64_binary(&bytes, Endian::Native), 0x1234_5678);

        let neg = (-1000_i16).to_ne_bytes();
        assert_eq!(get_s64_binary(&neg, Endian::Native), -1000);
    }

    #[test]
    fn test_put_binary_big_endian() {
        let mut buf = [0u8; 4];
        put_s64_binary(-2, &mut buf, Endian::Big);
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFE]);

        put_binary(0x0A0B, &mut buf, Endian::Big);
        assert_eq!(buf, [0x00, 0x00, 0x0A, 0x0B]);
    }

    #[test]
    fn test_put_binary_native() {
        let mut buf = [0u8; 8];
        put_s64_binary(-77, &mut buf, Endian::Native);
        assert_eq!(i64::from_ne_bytes(buf), -77);
    }

    #[test]
    fn test_packed_decode() {
        assert_eq!(get_s64_packed(&[0x12, 0x34, 0x5C]), 12345);
        assert_eq!(get_s64_packed(&[0x01, 0x2D]), -12);
        assert_eq!(get_u64_packed(&[0x01, 0x2D]), 12);
        assert_eq!(get_s64_packed(&[]), 0);
    }

    #[test]
    fn test_packed_encode() {
        let mut buf = [0u8; 3];
        put_s64_packed(-12345, true, &mut buf);
        assert_eq!(buf, [0x12, 0x34, 0x5D]);

        put_u64_packed(7, false, &mut buf);
        assert_eq!(buf, [0x00, 0x00, 0x7F]);
    }

    #[test]
    fn test_float_and_double() {
        let mut f = [0u8; 4];
        put_float(2.5, &mut f);
        assert_eq!(get_float(&f), 2.5);

        let mut d = [0u8; 8];
        put_double(-1.25, &mut d);
        assert_eq!(get_double(&d), -1.25);

        assert_eq!(get_double(&[0u8; 3]), 0.0);
    }
}
