// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

use std::fmt;

/// Enumerates the primitive element types an [`crate::Array`] can hold.
///
/// Names follow the numpy convention (`"int32"`, `"float32"`, ...) since that
/// is what manifests and generator schemas are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean, one byte per element.
    Bool,
    /// 8-bit unsigned integer.
    UInt8,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit unsigned integer.
    UInt64,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 64-bit IEEE 754 floating point.
    Float64,
}

impl DType {
    /// Every supported dtype, in declaration order.
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::UInt8,
        DType::Int8,
        DType::UInt16,
        DType::Int16,
        DType::UInt32,
        DType::Int32,
        DType::UInt64,
        DType::Int64,
        DType::Float32,
        DType::Float64,
    ];

    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Bool | DType::UInt8 | DType::Int8 => 1,
            DType::UInt16 | DType::Int16 => 2,
            DType::UInt32 | DType::Int32 | DType::Float32 => 4,
            DType::UInt64 | DType::Int64 | DType::Float64 => 8,
        }
    }

    /// Returns the canonical (numpy-style) name of this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::UInt8 => "uint8",
            DType::Int8 => "int8",
            DType::UInt16 => "uint16",
            DType::Int16 => "int16",
            DType::UInt32 => "uint32",
            DType::Int32 => "int32",
            DType::UInt64 => "uint64",
            DType::Int64 => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Parses a dtype name. Accepts canonical names and the short Rust-style
    /// aliases (`i32`, `f32`, `u8`, ...), case-insensitively.
    pub fn parse(s: &str) -> Option<DType> {
        match s.trim().to_lowercase().as_str() {
            "bool" => Some(DType::Bool),
            "uint8" | "u8" => Some(DType::UInt8),
            "int8" | "i8" => Some(DType::Int8),
            "uint16" | "u16" => Some(DType::UInt16),
            "int16" | "i16" => Some(DType::Int16),
            "uint32" | "u32" => Some(DType::UInt32),
            "int32" | "i32" => Some(DType::Int32),
            "uint64" | "u64" => Some(DType::UInt64),
            "int64" | "i64" => Some(DType::Int64),
            "float32" | "f32" => Some(DType::Float32),
            "float64" | "f64" => Some(DType::Float64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for DType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// A Rust scalar type that can be stored in an [`crate::Array`].
///
/// Values are encoded little-endian, so arrays are portable across hosts
/// and can be written to disk as-is.
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    /// The dtype tag for this scalar type.
    const DTYPE: DType;

    /// Appends the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes one value from exactly `DTYPE.size_bytes()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = $dtype;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_element! {
    u8 => DType::UInt8,
    i8 => DType::Int8,
    u16 => DType::UInt16,
    i16 => DType::Int16,
    u32 => DType::UInt32,
    i32 => DType::Int32,
    u64 => DType::UInt64,
    i64 => DType::Int64,
    f32 => DType::Float32,
    f64 => DType::Float64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bytes() {
        assert_eq!(DType::Bool.size_bytes(), 1);
        assert_eq!(DType::Int16.size_bytes(), 2);
        assert_eq!(DType::Int32.size_bytes(), 4);
        assert_eq!(DType::Float64.size_bytes(), 8);
    }

    #[test]
    fn test_parse_roundtrip() {
        for dtype in DType::ALL {
            assert_eq!(DType::parse(dtype.as_str()), Some(dtype));
        }
        assert_eq!(DType::parse("I32"), Some(DType::Int32));
        assert_eq!(DType::parse("f32"), Some(DType::Float32));
        assert_eq!(DType::parse("complex128"), None);
    }

    #[test]
    fn test_compare_with_str() {
        assert!(DType::Int32 == "int32");
        assert_eq!(format!("{}", DType::UInt8), "uint8");
    }

    #[test]
    fn test_element_le_encoding() {
        let mut out = Vec::new();
        (-2i32).write_le(&mut out);
        assert_eq!(out, vec![0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(i32::read_le(&out), -2);

        let mut out = Vec::new();
        true.write_le(&mut out);
        assert!(bool::read_le(&out));
    }
}
