//! Data section decoding
//!
//! Implements the complete MaxMind DB data type specification for reading.
//! The data section is treated as an arena: every value is addressed by its
//! byte offset, and pointers are resolved per decode call by jumping to
//! another offset in the same buffer. Nothing is cached between calls.
//!
//! # Supported Types
//!
//! - **Pointer**: Reference to another data item (followed transparently)
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16**: Unsigned 16-bit integers
//! - **Uint32**: Unsigned 32-bit integers
//! - **Map**: Key-value pairs (string keys)
//! - **Int32**: Signed 32-bit integers
//! - **Uint64**: Unsigned 64-bit integers
//! - **Uint128**: Unsigned 128-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Control byte encodes type (3 bits) and size/payload (5 bits). Type 0
//! means "extended": the real type is the next byte plus 7. All multi-byte
//! sizes and integers are big-endian.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::mmdb::MmdbError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Maximum nesting of maps and arrays (same bound as libmaxminddb)
pub const MAXIMUM_DATA_STRUCTURE_DEPTH: usize = 512;

/// Data value decoded from the data section
///
/// Maps keep the order in which their pairs are stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Pointer to another data item (offset into the data section).
    /// Only produced by [`DataDecoder::decode_shallow`]; regular decoding
    /// follows pointers.
    Pointer(u32),
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map in stored order
    Map(Vec<(String, DataValue)>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Type tag of this value
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Pointer(_) => DataType::Pointer,
            DataValue::String(_) => DataType::String,
            DataValue::Double(_) => DataType::Double,
            DataValue::Bytes(_) => DataType::Bytes,
            DataValue::Uint16(_) => DataType::Uint16,
            DataValue::Uint32(_) => DataType::Uint32,
            DataValue::Map(_) => DataType::Map,
            DataValue::Int32(_) => DataType::Int32,
            DataValue::Uint64(_) => DataType::Uint64,
            DataValue::Uint128(_) => DataType::Uint128,
            DataValue::Array(_) => DataType::Array,
            DataValue::Bool(_) => DataType::Bool,
            DataValue::Float(_) => DataType::Float,
        }
    }

    /// Look up a key in a map value. The first stored pair wins.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Double contents, if this is a double
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Widen any unsigned integer type that fits in 64 bits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(*n as u64),
            DataValue::Uint32(n) => Some(*n as u64),
            DataValue::Uint64(n) => Some(*n),
            DataValue::Uint128(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::Pointer(offset) => serializer.serialize_str(&format!("<pointer {}>", offset)),
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Bytes(b) => serializer.collect_seq(b),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            DataValue::Int32(n) => serializer.serialize_i32(*n),
            DataValue::Uint64(n) => serializer.serialize_u64(*n),
            // JSON consumers cannot hold 128-bit integers
            DataValue::Uint128(n) => serializer.serialize_str(&n.to_string()),
            DataValue::Array(items) => serializer.collect_seq(items),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Float(f) => serializer.serialize_f32(*f),
        }
    }
}

/// Type tags of the data section encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Type 1
    Pointer = 1,
    /// Type 2
    String = 2,
    /// Type 3
    Double = 3,
    /// Type 4
    Bytes = 4,
    /// Type 5
    Uint16 = 5,
    /// Type 6
    Uint32 = 6,
    /// Type 7
    Map = 7,
    /// Type 8 (extended)
    Int32 = 8,
    /// Type 9 (extended)
    Uint64 = 9,
    /// Type 10 (extended)
    Uint128 = 10,
    /// Type 11 (extended)
    Array = 11,
    /// Type 14 (extended)
    Bool = 14,
    /// Type 15 (extended)
    Float = 15,
}

impl DataType {
    /// Map a numeric type code to a decodable type.
    ///
    /// Codes 12 (data cache container) and 13 (end marker) are reserved
    /// for writers and never valid in a lookup.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(DataType::Pointer),
            2 => Some(DataType::String),
            3 => Some(DataType::Double),
            4 => Some(DataType::Bytes),
            5 => Some(DataType::Uint16),
            6 => Some(DataType::Uint32),
            7 => Some(DataType::Map),
            8 => Some(DataType::Int32),
            9 => Some(DataType::Uint64),
            10 => Some(DataType::Uint128),
            11 => Some(DataType::Array),
            14 => Some(DataType::Bool),
            15 => Some(DataType::Float),
            _ => None,
        }
    }

    /// Name used in the format documentation
    pub fn name(self) -> &'static str {
        match self {
            DataType::Pointer => "pointer",
            DataType::String => "utf8_string",
            DataType::Double => "double",
            DataType::Bytes => "bytes",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Map => "map",
            DataType::Int32 => "int32",
            DataType::Uint64 => "uint64",
            DataType::Uint128 => "uint128",
            DataType::Array => "array",
            DataType::Bool => "boolean",
            DataType::Float => "float",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One segment of a lookup path: a map key or an array index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElement<'p> {
    /// Map key, compared byte-for-byte
    Key(&'p str),
    /// Array index, must be in `[0, size)`
    Index(usize),
}

impl<'p> From<&'p str> for PathElement<'p> {
    fn from(key: &'p str) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement<'_> {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

/// Decoded control byte(s)
#[derive(Debug, Clone, Copy)]
enum Control {
    /// Pointer with its resolved target offset
    Pointer(u32),
    /// Any other type with its decoded size
    Value { data_type: DataType, size: usize },
}

/// Header of a value after any pointer has been followed
#[derive(Debug, Clone, Copy)]
struct Resolved {
    data_type: DataType,
    size: usize,
    /// Offset of the first payload byte
    payload: usize,
    /// True when the value was reached through a pointer
    followed: bool,
}

/// Data section decoder
///
/// Borrows the data section (or the metadata section) and decodes values at
/// byte offsets relative to its start. Pointer targets are relative to the
/// same start. The decoder holds no mutable state, so one instance can be
/// shared by any number of readers.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    buffer: &'a [u8],
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder for a data section
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Decode the value at the given offset, following pointers
    pub fn decode(&self, offset: u32) -> Result<DataValue, MmdbError> {
        let mut cursor = offset as usize;
        self.decode_at(&mut cursor, 0)
    }

    /// Decode the value at the given offset without following a pointer
    /// stored at that exact offset.
    ///
    /// Nested values are still fully resolved; only a top-level pointer is
    /// reported as [`DataValue::Pointer`].
    pub fn decode_shallow(&self, offset: u32) -> Result<DataValue, MmdbError> {
        let mut cursor = offset as usize;
        match self.read_control(&mut cursor)? {
            Control::Pointer(target) => Ok(DataValue::Pointer(target)),
            Control::Value { data_type, size } => {
                self.decode_payload(&mut cursor, data_type, size, 0)
            }
        }
    }

    /// Follow a path of map keys and array indices from `offset` and decode
    /// the value it leads to.
    ///
    /// Only the containers on the path are walked; siblings are skipped
    /// without being materialized. A segment whose kind does not match the
    /// container (or a missing key, or an index out of range) yields
    /// [`MmdbError::PathNotFound`].
    pub fn decode_path(
        &self,
        offset: u32,
        path: &[PathElement<'_>],
    ) -> Result<DataValue, MmdbError> {
        let mut cursor = offset as usize;

        for element in path {
            let Resolved {
                data_type,
                size,
                payload,
                ..
            } = self.resolve(&mut cursor)?;
            cursor = payload;

            match (data_type, element) {
                (DataType::Map, PathElement::Key(wanted)) => {
                    let mut found = false;
                    for _ in 0..size {
                        let key = self.read_key(&mut cursor)?;
                        if key == wanted.as_bytes() {
                            found = true;
                            break;
                        }
                        self.skip_value(&mut cursor, 0)?;
                    }
                    if !found {
                        return Err(MmdbError::PathNotFound);
                    }
                }
                (DataType::Array, PathElement::Index(index)) => {
                    if *index >= size {
                        return Err(MmdbError::PathNotFound);
                    }
                    for _ in 0..*index {
                        self.skip_value(&mut cursor, 0)?;
                    }
                }
                _ => return Err(MmdbError::PathNotFound),
            }
        }

        self.decode_at(&mut cursor, 0)
    }

    /// Like [`decode_path`](Self::decode_path), but fails with
    /// [`MmdbError::TypeMismatch`] unless the terminal value has the
    /// expected type.
    pub fn decode_path_as(
        &self,
        offset: u32,
        path: &[PathElement<'_>],
        expected: DataType,
    ) -> Result<DataValue, MmdbError> {
        let value = self.decode_path(offset, path)?;
        let found = value.data_type();
        if found != expected {
            return Err(MmdbError::TypeMismatch { expected, found });
        }
        Ok(value)
    }

    fn decode_at(&self, cursor: &mut usize, depth: usize) -> Result<DataValue, MmdbError> {
        let resolved = self.resolve(cursor)?;
        let mut payload = resolved.payload;
        let value = self.decode_payload(&mut payload, resolved.data_type, resolved.size, depth)?;
        if !resolved.followed {
            *cursor = payload;
        }
        Ok(value)
    }

    fn decode_payload(
        &self,
        cursor: &mut usize,
        data_type: DataType,
        size: usize,
        depth: usize,
    ) -> Result<DataValue, MmdbError> {
        match data_type {
            DataType::Pointer => Err(corrupt("pointer payload decoded as value")),
            DataType::String => {
                let bytes = self.take(cursor, size)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| corrupt("invalid UTF-8 in string"))?;
                Ok(DataValue::String(s.to_string()))
            }
            DataType::Double => {
                let bytes = self.take_exact::<8>(cursor, size, "double")?;
                Ok(DataValue::Double(f64::from_be_bytes(bytes)))
            }
            DataType::Bytes => Ok(DataValue::Bytes(self.take(cursor, size)?.to_vec())),
            DataType::Uint16 => Ok(DataValue::Uint16(self.read_uint(cursor, size, 2)? as u16)),
            DataType::Uint32 => Ok(DataValue::Uint32(self.read_uint(cursor, size, 4)? as u32)),
            DataType::Map => self.decode_map(cursor, size, depth),
            // Shorter int32 encodings are zero-padded, never sign-extended
            DataType::Int32 => Ok(DataValue::Int32(self.read_uint(cursor, size, 4)? as u32 as i32)),
            DataType::Uint64 => Ok(DataValue::Uint64(self.read_uint(cursor, size, 8)? as u64)),
            DataType::Uint128 => Ok(DataValue::Uint128(self.read_uint(cursor, size, 16)?)),
            DataType::Array => self.decode_array(cursor, size, depth),
            DataType::Bool => match size {
                0 => Ok(DataValue::Bool(false)),
                1 => Ok(DataValue::Bool(true)),
                _ => Err(corrupt(format!("invalid boolean size {}", size))),
            },
            DataType::Float => {
                let bytes = self.take_exact::<4>(cursor, size, "float")?;
                Ok(DataValue::Float(f32::from_be_bytes(bytes)))
            }
        }
    }

    fn decode_map(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, MmdbError> {
        let depth = enter(depth)?;
        // Every pair needs at least two bytes
        let mut entries = Vec::with_capacity(count.min(self.remaining(*cursor) / 2));

        for _ in 0..count {
            let key = match self.decode_at(cursor, depth)? {
                DataValue::String(s) => s,
                other => {
                    return Err(corrupt(format!(
                        "map key must be utf8_string, found {}",
                        other.data_type()
                    )))
                }
            };
            let value = self.decode_at(cursor, depth)?;
            entries.push((key, value));
        }

        Ok(DataValue::Map(entries))
    }

    fn decode_array(
        &self,
        cursor: &mut usize,
        count: usize,
        depth: usize,
    ) -> Result<DataValue, MmdbError> {
        let depth = enter(depth)?;
        let mut array = Vec::with_capacity(count.min(self.remaining(*cursor)));

        for _ in 0..count {
            array.push(self.decode_at(cursor, depth)?);
        }

        Ok(DataValue::Array(array))
    }

    /// Read a map key as raw bytes, following a pointer if needed
    fn read_key(&self, cursor: &mut usize) -> Result<&'a [u8], MmdbError> {
        let resolved = self.resolve(cursor)?;
        if resolved.data_type != DataType::String {
            return Err(corrupt(format!(
                "map key must be utf8_string, found {}",
                resolved.data_type
            )));
        }
        let mut payload = resolved.payload;
        let key = self.take(&mut payload, resolved.size)?;
        if !resolved.followed {
            *cursor = payload;
        }
        Ok(key)
    }

    /// Advance the cursor past one value without materializing it
    fn skip_value(&self, cursor: &mut usize, depth: usize) -> Result<(), MmdbError> {
        match self.read_control(cursor)? {
            // The pointer bytes were consumed by read_control; the target
            // lives elsewhere and does not occupy space here.
            Control::Pointer(_) => Ok(()),
            Control::Value { data_type, size } => match data_type {
                DataType::Map => {
                    let depth = enter(depth)?;
                    for _ in 0..size {
                        self.skip_value(cursor, depth)?;
                        self.skip_value(cursor, depth)?;
                    }
                    Ok(())
                }
                DataType::Array => {
                    let depth = enter(depth)?;
                    for _ in 0..size {
                        self.skip_value(cursor, depth)?;
                    }
                    Ok(())
                }
                DataType::Bool => Ok(()),
                _ => self.take(cursor, size).map(|_| ()),
            },
        }
    }

    /// Read the header of the value at `cursor`, jumping through a pointer
    /// if one is stored there.
    ///
    /// `cursor` always ends up past the bytes that belong to this position:
    /// the control (and size) bytes of an inline value, or the whole pointer.
    /// The returned payload position is where the value's data starts.
    fn resolve(&self, cursor: &mut usize) -> Result<Resolved, MmdbError> {
        match self.read_control(cursor)? {
            Control::Value { data_type, size } => Ok(Resolved {
                data_type,
                size,
                payload: *cursor,
                followed: false,
            }),
            Control::Pointer(target) => {
                let mut payload = target as usize;
                match self.read_control(&mut payload)? {
                    Control::Pointer(_) => Err(corrupt(format!(
                        "pointer to {} points to another pointer",
                        target
                    ))),
                    Control::Value { data_type, size } => Ok(Resolved {
                        data_type,
                        size,
                        payload,
                        followed: true,
                    }),
                }
            }
        }
    }

    fn read_control(&self, cursor: &mut usize) -> Result<Control, MmdbError> {
        let ctrl = self.read_byte(cursor)?;
        let mut type_code = ctrl >> 5;

        if type_code == 1 {
            return self.read_pointer(cursor, ctrl).map(Control::Pointer);
        }

        if type_code == 0 {
            let extended = self.read_byte(cursor)?;
            type_code = extended
                .checked_add(7)
                .filter(|code| *code > 7)
                .ok_or_else(|| corrupt(format!("invalid extended type {}", extended)))?;
        }

        let data_type = DataType::from_code(type_code)
            .ok_or_else(|| corrupt(format!("invalid data type {}", type_code)))?;
        let size = self.read_size(cursor, ctrl & 0x1F)?;

        Ok(Control::Value { data_type, size })
    }

    /// Pointer layout: `001SSVVV`, SS picks 1-4 following bytes, VVV are the
    /// high bits for the three shorter forms.
    fn read_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<u32, MmdbError> {
        let size_class = (ctrl >> 3) & 0x3;
        let high = (ctrl & 0x7) as u32;
        let bytes = self.take(cursor, size_class as usize + 1)?;
        let tail = bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);

        let target = match size_class {
            0 => (high << 8) | tail,
            1 => ((high << 16) | tail) + 2048,
            2 => ((high << 24) | tail) + 526_336,
            _ => tail,
        };

        Ok(target)
    }

    fn read_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize, MmdbError> {
        let extra = match size_bits {
            0..=28 => return Ok(size_bits as usize),
            29 => 1,
            30 => 2,
            _ => 3,
        };
        let bytes = self.take(cursor, extra)?;
        let value = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);

        Ok(match size_bits {
            29 => 29 + value,
            30 => 285 + value,
            _ => 65_821 + value,
        })
    }

    /// Big-endian unsigned integer of `size` bytes, at most `max` bytes wide
    fn read_uint(&self, cursor: &mut usize, size: usize, max: usize) -> Result<u128, MmdbError> {
        if size > max {
            return Err(corrupt(format!(
                "integer of {} bytes exceeds {} byte width",
                size, max
            )));
        }
        let bytes = self.take(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, b| (acc << 8) | *b as u128))
    }

    fn take_exact<const N: usize>(
        &self,
        cursor: &mut usize,
        size: usize,
        what: &str,
    ) -> Result<[u8; N], MmdbError> {
        if size != N {
            return Err(corrupt(format!("invalid {} size {}", what, size)));
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(cursor, N)?);
        Ok(bytes)
    }

    fn read_byte(&self, cursor: &mut usize) -> Result<u8, MmdbError> {
        let byte = *self
            .buffer
            .get(*cursor)
            .ok_or_else(|| corrupt(format!("offset {} past end of section", *cursor)))?;
        *cursor += 1;
        Ok(byte)
    }

    fn take(&self, cursor: &mut usize, len: usize) -> Result<&'a [u8], MmdbError> {
        let end = cursor
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                corrupt(format!(
                    "{} bytes at offset {} exceed section of {} bytes",
                    len,
                    *cursor,
                    self.buffer.len()
                ))
            })?;
        let bytes = &self.buffer[*cursor..end];
        *cursor = end;
        Ok(bytes)
    }

    fn remaining(&self, cursor: usize) -> usize {
        self.buffer.len().saturating_sub(cursor)
    }
}

fn enter(depth: usize) -> Result<usize, MmdbError> {
    if depth >= MAXIMUM_DATA_STRUCTURE_DEPTH {
        return Err(corrupt("maximum data structure depth exceeded"));
    }
    Ok(depth + 1)
}

fn corrupt(msg: impl Into<String>) -> MmdbError {
    MmdbError::CorruptData(msg.into())
}
