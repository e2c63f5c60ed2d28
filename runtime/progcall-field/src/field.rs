//!
//! Field Descriptors
//!
//! `Field` is a raw view over caller-owned parameter storage together with
//! the attributes needed to interpret it. Conversions dispatch on the
//! declared `FieldType`:
//!
//! | type | decode | encode |
//! |------|--------|--------|
//! | Display, Edited | display digits | display digits / decimal move |
//! | Binary | big-endian when byte-swapped, host order otherwise | same |
//! | NativeBinary | host order | host order |
//! | Packed | packed decimal | packed decimal |
//! | Float, Double | IEEE, truncated toward zero | IEEE |
//! | Alphanumeric, Group | decimal move | decimal move |
//!

use std::ptr::NonNull;

use crate::codec::{self, Endian};
use crate::convert;

/// Declared encoding of a field. The discriminants are the type codes
/// reported across the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Group = 0x01,
    Display = 0x10,
    Binary = 0x11,
    Packed = 0x12,
    Float = 0x13,
    Double = 0x14,
    NativeBinary = 0x1B,
    Alphanumeric = 0x21,
    Edited = 0x24,
}

impl FieldType {
    pub fn code(self) -> i32 {
        self as u8 as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0x01 => Some(FieldType::Group),
            0x10 => Some(FieldType::Display),
            0x11 => Some(FieldType::Binary),
            0x12 => Some(FieldType::Packed),
            0x13 => Some(FieldType::Float),
            0x14 => Some(FieldType::Double),
            0x1B => Some(FieldType::NativeBinary),
            0x21 => Some(FieldType::Alphanumeric),
            0x24 => Some(FieldType::Edited),
            _ => None,
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, FieldType::Alphanumeric | FieldType::Group)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAttr {
    pub kind: FieldType,
    pub digits: u32,
    pub scale: i32,
    pub signed: bool,
    pub constant: bool,
    /// Binary field stored big-endian regardless of host order.
    pub binary_swap: bool,
    /// Binary field holding the full range of its storage size.
    pub real_binary: bool,
}

impl FieldAttr {
    pub const fn new(kind: FieldType, digits: u32, scale: i32) -> Self {
        Self {
            kind,
            digits,
            scale,
            signed: false,
            constant: false,
            binary_swap: false,
            real_binary: false,
        }
    }

    pub const fn text() -> Self {
        Self::new(FieldType::Alphanumeric, 0, 0)
    }

    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    pub const fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub const fn swapped(mut self) -> Self {
        self.binary_swap = true;
        self
    }

    pub const fn real_binary(mut self) -> Self {
        self.real_binary = true;
        self
    }
}

/// Raw descriptor of one parameter.
///
/// Constructing a `Field` is unsafe because every later read or write goes
/// through the stored pointer without a lifetime tying it to the storage.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    data: NonNull<u8>,
    size: usize,
    attr: FieldAttr,
}

impl Field {
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `size` bytes for as long
    /// as this field, or any copy of it, is used, and no Rust reference to
    /// that storage may be live while a conversion runs.
    pub unsafe fn from_raw(data: *mut u8, size: usize, attr: FieldAttr) -> Option<Self> {
        NonNull::new(data).map(|data| Self { data, size, attr })
    }

    /// # Safety
    ///
    /// Same contract as [`Field::from_raw`]: `buf` must outlive every use of
    /// the returned field.
    pub unsafe fn from_slice(buf: &mut [u8], attr: FieldAttr) -> Self {
        Self {
            data: NonNull::from(&mut *buf).cast(),
            size: buf.len(),
            attr,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn attr(&self) -> &FieldAttr {
        &self.attr
    }

    pub fn kind(&self) -> FieldType {
        self.attr.kind
    }

    pub fn is_constant(&self) -> bool {
        self.attr.constant
    }

    pub fn data_ptr(&self) -> *mut u8 {
        self.data.as_ptr()
    }

    /// The type a foreign caller should treat this field as. Binary fields
    /// already stored in host order are reported as native binary.
    pub fn reported_type(&self) -> FieldType {
        if self.attr.kind == FieldType::Binary
            && (self.attr.real_binary || (cfg!(target_endian = "little") && !self.attr.binary_swap))
        {
            return FieldType::NativeBinary;
        }
        self.attr.kind
    }

    fn binary_endian(&self) -> Endian {
        if self.attr.kind == FieldType::Binary && self.attr.binary_swap {
            Endian::Big
        } else {
            Endian::Native
        }
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: guaranteed by the construction contract.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.size) }
    }

    #[allow(clippy::mut_from_ref)]
    fn bytes_mut(&self) -> &mut [u8] {
        // SAFETY: guaranteed by the construction contract.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.size) }
    }

    pub fn get_s64(&self) -> i64 {
        let data = self.bytes();
        match self.attr.kind {
            FieldType::Display | FieldType::Edited => codec::get_s64_display(data),
            FieldType::Binary | FieldType::NativeBinary => {
                codec::get_s64_binary(data, self.binary_endian())
            }
            FieldType::Packed => codec::get_s64_packed(data),
            FieldType::Float => codec::get_float(data) as i64,
            FieldType::Double => codec::get_double(data) as i64,
            FieldType::Alphanumeric | FieldType::Group => {
                convert::parse_scaled(data, self.attr.scale).to_i64()
            }
        }
    }

    pub fn get_u64(&self) -> u64 {
        let data = self.bytes();
        match self.attr.kind {
            FieldType::Display | FieldType::Edited => codec::get_u64_display(data),
            FieldType::Binary | FieldType::NativeBinary => {
                codec::get_u64_binary(data, self.binary_endian())
            }
            FieldType::Packed => codec::get_u64_packed(data),
            FieldType::Float => codec::get_float(data) as u64,
            FieldType::Double => codec::get_double(data) as u64,
            FieldType::Alphanumeric | FieldType::Group => {
                convert::parse_scaled(data, self.attr.scale).magnitude
            }
        }
    }

    /// Stores `val` without looking at the constant flag; callers that
    /// expose fields to foreign code check it first.
    pub fn put_s64(&self, val: i64) {
        let data = self.bytes_mut();
        match self.attr.kind {
            FieldType::Display => codec::put_s64_display(val, self.attr.signed, data),
            FieldType::Binary | FieldType::NativeBinary => {
                codec::put_s64_binary(val, data, self.binary_endian())
            }
            FieldType::Packed => codec::put_s64_packed(val, self.attr.signed, data),
            FieldType::Float => codec::put_float(val as f32, data),
            FieldType::Double => codec::put_double(val as f64, data),
            FieldType::Edited | FieldType::Alphanumeric | FieldType::Group => {
                convert::store_s64(val, self.attr.scale, self.attr.kind, data)
            }
        }
    }

    pub fn put_u64(&self, val: u64) {
        let data = self.bytes_mut();
        match self.attr.kind {
            FieldType::Display => codec::put_u64_display(val, data),
            FieldType::Binary | FieldType::NativeBinary => {
                codec::put_binary(val, data, self.binary_endian())
            }
            FieldType::Packed => codec::put_u64_packed(val, self.attr.signed, data),
            FieldType::Float => codec::put_float(val as f32, data),
            FieldType::Double => codec::put_double(val as f64, data),
            FieldType::Edited | FieldType::Alphanumeric | FieldType::Group => {
                convert::store_u64(val, self.attr.scale, self.attr.kind, data)
            }
        }
    }

    /// Field contents as text with trailing spaces removed.
    pub fn get_text(&self) -> String {
        let data = self.bytes();
        let end = data.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        String::from_utf8_lossy(&data[..end]).into_owned()
    }

    /// Copies `text` into the field, space-padding or truncating to its size.
    pub fn put_text(&self, text: &[u8]) {
        let data = self.bytes_mut();
        let n = text.len().min(data.len());
        data[..n].copy_from_slice(&text[..n]);
        data[n..].fill(b' ');
    }

    /// Copies up to `dest.len()` bytes of the field into `dest` and returns
    /// the count copied.
    pub fn read_block(&self, dest: &mut [u8]) -> usize {
        let data = self.bytes();
        let n = data.len().min(dest.len());
        dest[..n].copy_from_slice(&data[..n]);
        n
    }

    /// Overwrites the leading bytes of the field with `src`, never more than
    /// the field size. Remaining bytes are left as they were.
    pub fn write_block(&self, src: &[u8]) -> usize {
        let data = self.bytes_mut();
        let n = data.len().min(src.len());
        data[..n].copy_from_slice(&src[..n]);
        n
    }

    /// Copies this field into `dest` and returns a descriptor of the copy
    /// flagged constant. Returns `None` when `dest` is too small.
    ///
    /// # Safety
    ///
    /// `dest` must outlive every use of the returned field.
    pub unsafe fn constant_copy(&self, dest: &mut [u8]) -> Option<Field> {
        let dest = dest.get_mut(..self.size)?;
        dest.copy_from_slice(self.bytes());
        let attr = FieldAttr {
            constant: true,
            ..self.attr
        };
        // SAFETY: forwarded to the caller.
        Some(unsafe { Field::from_slice(dest, attr) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for kind in [
            FieldType::Group,
            FieldType::Display,
            FieldType::Binary,
            FieldType::Packed,
            FieldType::Float,
            FieldType::Double,
            FieldType::NativeBinary,
            FieldType::Alphanumeric,
            FieldType::Edited,
        ] {
            assert_eq!(FieldType::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FieldType::from_code(0x7F), None);
    }

    #[test]
    fn test_display_field_get_put() {
        let mut buf = *b"0000";
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Display, 4, 0).signed()) };
        field.put_s64(-31);
        assert_eq!(field.get_s64(), -31);
        assert_eq!(field.get_u64(), 31);
        assert_eq!(&buf, b"003q");
    }

    #[test]
    fn test_text_field_with_wide_scale_reads_without_overflow() {
        let mut buf = *b"1.5 ";
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Alphanumeric, 0, 20)) };
        let _ = field.get_s64();
        let _ = field.get_u64();

        let mut zero = *b"0.0";
        let field = unsafe { Field::from_slice(&mut zero, FieldAttr::new(FieldType::Alphanumeric, 0, 38)) };
        assert_eq!(field.get_s64(), 0);
    }

    #[test]
    fn test_swapped_binary_is_big_endian() {
        let mut buf = [0u8; 4];
        let attr = FieldAttr::new(FieldType::Binary, 9, 0).signed().swapped();
        let field = unsafe { Field::from_slice(&mut buf, attr) };
        field.put_s64(258);
        assert_eq!(field.get_s64(), 258);
        assert_eq!(buf, [0, 0, 1, 2]);
    }

    #[test]
    fn test_reported_type_for_binary() {
        let mut buf = [0u8; 4];
        let swapped = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Binary, 9, 0).swapped()) };
        assert_eq!(swapped.reported_type(), FieldType::Binary);

        let real = unsafe {
            Field::from_slice(&mut buf, FieldAttr::new(FieldType::Binary, 9, 0).swapped().real_binary())
        };
        assert_eq!(real.reported_type(), FieldType::NativeBinary);

        let packed = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Packed, 7, 0)) };
        assert_eq!(packed.reported_type(), FieldType::Packed);
    }

    #[test]
    fn test_float_truncates_toward_zero() {
        let mut buf = [0u8; 8];
        codec::put_double(-7.9, &mut buf);
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Double, 0, 0)) };
        assert_eq!(field.get_s64(), -7);
    }

    #[test]
    fn test_text_get_put() {
        let mut buf = *b"xxxxxx";
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::text()) };
        field.put_text(b"abc");
        assert_eq!(field.get_text(), "abc");
        assert_eq!(&buf, b"abc   ");
    }

    #[test]
    fn test_block_copies_are_bounded() {
        let mut buf = *b"12345";
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Group, 0, 0)) };

        let mut small = [0u8; 3];
        assert_eq!(field.read_block(&mut small), 3);
        assert_eq!(&small, b"123");

        assert_eq!(field.write_block(b"abcdefgh"), 5);
        assert_eq!(&buf, b"abcde");
    }

    #[test]
    fn test_constant_copy() {
        let mut buf = *b"0042";
        let field = unsafe { Field::from_slice(&mut buf, FieldAttr::new(FieldType::Display, 4, 0)) };

        let mut storage = [0u8; 4];
        let copy = unsafe { field.constant_copy(&mut storage) }.unwrap();
        assert!(copy.is_constant());
        assert_eq!(copy.get_s64(), 42);

        let mut tiny = [0u8; 2];
        assert!(unsafe { field.constant_copy(&mut tiny) }.is_none());
    }
}
