// Fixed-layout marshaling between typed records and raw message buffers.
// Layout rules shared with the agent: fields in declaration order, 1-byte
// packing, little-endian integers, 4-byte booleans, UTF-16 fixed-width strings.

use crate::Core::error::{ChannelError, Result};

/// Capacity of every fixed-width string field, in UTF-16 code units.
pub const FIXED_STRING_UNITS: usize = 512;

/// Encoded size of a fixed-width string field.
pub const FIXED_STRING_BYTES: usize = FIXED_STRING_UNITS * 2;

/// A record with a fixed, pre-agreed binary layout.
pub trait WireRecord: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode into `dst`, which is exactly `SIZE` bytes long.
    fn encode(&self, dst: &mut [u8]) -> Result<()>;

    /// Decode from `src`, which is exactly `SIZE` bytes long.
    fn decode(src: &[u8]) -> Result<Self>;
}

fn overrun(offset: usize, needed: usize, capacity: usize) -> ChannelError {
    ChannelError::Overrun {
        offset,
        needed,
        capacity,
    }
}

/// Reinterpret `T::SIZE` bytes of `buffer` at `offset` as a `T`.
pub fn read<T: WireRecord>(buffer: &[u8], offset: usize) -> Result<T> {
    let end = offset
        .checked_add(T::SIZE)
        .ok_or_else(|| overrun(offset, T::SIZE, buffer.len()))?;
    let src = buffer
        .get(offset..end)
        .ok_or_else(|| overrun(offset, T::SIZE, buffer.len()))?;
    T::decode(src)
}

/// Write `value` into `buffer` at `offset`; returns the offset just past it.
pub fn write<T: WireRecord>(value: &T, buffer: &mut [u8], offset: usize) -> Result<usize> {
    let capacity = buffer.len();
    let end = offset
        .checked_add(T::SIZE)
        .ok_or_else(|| overrun(offset, T::SIZE, capacity))?;
    let dst = buffer
        .get_mut(offset..end)
        .ok_or_else(|| overrun(offset, T::SIZE, capacity))?;
    value.encode(dst)?;
    Ok(end)
}

// Field helpers. Callers hand in slices already cut to the record size, so the
// fixed indexing below cannot leave the record.

pub(crate) fn get_i32(src: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]])
}

pub(crate) fn get_u32(src: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]])
}

pub(crate) fn put_i32(dst: &mut [u8], at: usize, value: i32) {
    dst[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(dst: &mut [u8], at: usize, value: u32) {
    dst[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Booleans travel as 4-byte integers; any non-zero value reads as true.
pub(crate) fn get_bool(src: &[u8], at: usize) -> bool {
    get_i32(src, at) != 0
}

pub(crate) fn put_bool(dst: &mut [u8], at: usize, value: bool) {
    put_i32(dst, at, value as i32);
}

/// Check that `value` fits a fixed-width string field and round-trips through it.
pub fn validate_fixed_string(value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(ChannelError::EmbeddedNul);
    }
    let units = value.encode_utf16().count();
    if units > FIXED_STRING_UNITS {
        return Err(ChannelError::NameTooLong {
            units,
            capacity: FIXED_STRING_UNITS,
        });
    }
    Ok(())
}

/// Encode `value` as a NUL-padded UTF-16 field at `dst[at..at + FIXED_STRING_BYTES]`.
pub(crate) fn put_fixed_string(dst: &mut [u8], at: usize, value: &str) -> Result<()> {
    validate_fixed_string(value)?;
    let field = &mut dst[at..at + FIXED_STRING_BYTES];
    field.fill(0);
    for (slot, unit) in field.chunks_exact_mut(2).zip(value.encode_utf16()) {
        slot.copy_from_slice(&unit.to_le_bytes());
    }
    Ok(())
}

/// Decode a UTF-16 field terminated by the first NUL or by its capacity.
pub(crate) fn get_fixed_string(src: &[u8], at: usize) -> Result<String> {
    let field = &src[at..at + FIXED_STRING_BYTES];
    let units: Vec<u16> = field
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16(&units).map_err(|_| ChannelError::MalformedString)
}
