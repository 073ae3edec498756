//! Scalar type system.
//!
//! Field element types and the numeric types literals and symbols are coerced to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::IrError;

/// Scalar types supported for fields, symbols and literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean.
    #[serde(rename = "bool")]
    Bool,
    /// 32-bit signed integer.
    #[serde(rename = "int32")]
    I32,
    /// 64-bit signed integer.
    #[serde(rename = "int64")]
    I64,
    /// 32-bit unsigned integer.
    #[serde(rename = "uint32")]
    U32,
    /// 64-bit unsigned integer.
    #[serde(rename = "uint64")]
    U64,
    /// 32-bit floating point.
    #[serde(rename = "float32", alias = "float")]
    F32,
    /// 64-bit floating point.
    #[serde(rename = "float64", alias = "double")]
    F64,
}

impl ScalarType {
    /// C / C++ spelling of the type.
    pub fn c_name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I32 => "int32_t",
            ScalarType::I64 => "int64_t",
            ScalarType::U32 => "uint32_t",
            ScalarType::U64 => "uint64_t",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
        }
    }

    /// Get the size in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            ScalarType::Bool => 1,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    /// Check if this is a floating point type.
    pub fn is_float(&self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    /// Suffix appended to floating point literals of this type.
    pub fn literal_suffix(&self) -> &'static str {
        match self {
            ScalarType::F32 => "f",
            _ => "",
        }
    }

    /// Floating point type matching a precision policy.
    pub fn float_for_precision(double_accuracy: bool) -> Self {
        if double_accuracy {
            ScalarType::F64
        } else {
            ScalarType::F32
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::I32 => "int32",
            ScalarType::I64 => "int64",
            ScalarType::U32 => "uint32",
            ScalarType::U64 => "uint64",
            ScalarType::F32 => "float32",
            ScalarType::F64 => "float64",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ScalarType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bool" => Ok(ScalarType::Bool),
            "int32" | "int32_t" | "int" | "i32" => Ok(ScalarType::I32),
            "int64" | "int64_t" | "i64" => Ok(ScalarType::I64),
            "uint32" | "uint32_t" | "u32" => Ok(ScalarType::U32),
            "uint64" | "uint64_t" | "u64" => Ok(ScalarType::U64),
            "float32" | "float" | "f32" => Ok(ScalarType::F32),
            "float64" | "double" | "f64" => Ok(ScalarType::F64),
            other => Err(IrError::UnknownDataType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_names() {
        assert_eq!(ScalarType::F64.c_name(), "double");
        assert_eq!(ScalarType::F32.c_name(), "float");
        assert_eq!(ScalarType::I32.c_name(), "int32_t");
    }

    #[test]
    fn test_parse() {
        assert_eq!("double".parse::<ScalarType>().unwrap(), ScalarType::F64);
        assert_eq!("float32".parse::<ScalarType>().unwrap(), ScalarType::F32);
        assert!(matches!(
            "complex128".parse::<ScalarType>(),
            Err(IrError::UnknownDataType(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ScalarType::F64).unwrap();
        assert_eq!(json, "\"float64\"");
        let parsed: ScalarType = serde_json::from_str("\"double\"").unwrap();
        assert_eq!(parsed, ScalarType::F64);
    }

    #[test]
    fn test_precision_policy() {
        assert_eq!(ScalarType::float_for_precision(true), ScalarType::F64);
        assert_eq!(ScalarType::float_for_precision(false), ScalarType::F32);
        assert_eq!(ScalarType::F32.literal_suffix(), "f");
        assert_eq!(ScalarType::F64.literal_suffix(), "");
    }
}
