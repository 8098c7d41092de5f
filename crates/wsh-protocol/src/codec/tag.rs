//! Canonical major-type tag bytes for the wire object model.
//!
//! Assigned once; never renumbered. Integer tags are followed by a one-byte
//! size class (`SIZE_U8`..`SIZE_U64`) selecting the smallest head form that
//! holds the value, per §4.1's "smallest head form for each integer".

/// Unsigned integer, followed by a size-class byte and that many big-endian bytes.
pub const UINT: u8 = 0x00;
/// Signed integer (zigzag-encoded), followed by a size-class byte and bytes.
pub const INT: u8 = 0x01;
/// IEEE 754 double, always 8 bytes, big-endian.
pub const FLOAT: u8 = 0x02;
/// Byte string: `u32` BE length prefix, then raw bytes.
pub const BYTES: u8 = 0x03;
/// UTF-8 text string: `u32` BE length prefix, then bytes.
pub const TEXT: u8 = 0x04;
/// Ordered array: `u32` BE count prefix, then that many values.
pub const ARRAY: u8 = 0x05;
/// String-keyed map: `u32` BE count prefix, then that many (text, value) pairs.
pub const MAP: u8 = 0x06;
/// Boolean: one byte follows, 0x00 or 0x01.
pub const BOOL: u8 = 0x07;
/// Null: no body.
pub const NULL: u8 = 0x08;

/// Size class: value fits in a single byte.
pub const SIZE_U8: u8 = 0;
/// Size class: value fits in two bytes.
pub const SIZE_U16: u8 = 1;
/// Size class: value fits in four bytes.
pub const SIZE_U32: u8 = 2;
/// Size class: value needs the full eight bytes.
pub const SIZE_U64: u8 = 3;

/// Choose the smallest size class that can hold `v`.
#[must_use]
pub fn size_class_for(v: u64) -> u8 {
    if v <= u64::from(u8::MAX) {
        SIZE_U8
    } else if v <= u64::from(u16::MAX) {
        SIZE_U16
    } else if v <= u64::from(u32::MAX) {
        SIZE_U32
    } else {
        SIZE_U64
    }
}

/// Number of bytes a size class occupies on the wire.
#[must_use]
pub fn size_class_len(class: u8) -> usize {
    match class {
        SIZE_U8 => 1,
        SIZE_U16 => 2,
        SIZE_U32 => 4,
        _ => 8,
    }
}
