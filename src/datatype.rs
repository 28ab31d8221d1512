//! Parsing of SigMF datatype tokens such as `cf32_le`, `ri16_be` or `cu8`.
//!
//! Grammar: `(c|r)(f32|f64|i32|i16|u32|u16|i8|u8)(_le|_be)?`. The endianness suffix is
//! optional everywhere. It carries no meaning for 8-bit components, and multi-byte
//! components without a suffix are read as little-endian.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatatypeError {
    #[error("Invalid datatype {0:?}, expected (c|r)(f32|f64|i32|i16|u32|u16|i8|u8)(_le|_be)?")]
    InvalidDatatype(String),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SampleFormat {
    Float,
    Int,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Endianness {
    Little,
    Big,
}

/// Every component type allowed by the grammar. Floats are always signed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ComponentType {
    F32,
    F64,
    I32,
    I16,
    I8,
    U32,
    U16,
    U8,
}

impl ComponentType {
    fn from_token(s: &str) -> Option<Self> {
        Some(match s {
            "f32" => Self::F32,
            "f64" => Self::F64,
            "i32" => Self::I32,
            "i16" => Self::I16,
            "i8" => Self::I8,
            "u32" => Self::U32,
            "u16" => Self::U16,
            "u8" => Self::U8,
            _ => return None,
        })
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I16 => "i16",
            Self::I8 => "i8",
            Self::U32 => "u32",
            Self::U16 => "u16",
            Self::U8 => "u8",
        }
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Self::F32 | Self::F64 => SampleFormat::Float,
            _ => SampleFormat::Int,
        }
    }

    pub fn is_signed(&self) -> bool {
        !matches!(self, Self::U32 | Self::U16 | Self::U8)
    }

    pub fn bits(&self) -> u32 {
        match self {
            Self::F64 => 64,
            Self::F32 | Self::I32 | Self::U32 => 32,
            Self::I16 | Self::U16 => 16,
            Self::I8 | Self::U8 => 8,
        }
    }

    pub fn bytes(&self) -> usize {
        (self.bits() / 8) as usize
    }
}

/// Structured form of a datatype token.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Datatype {
    complex: bool,
    component: ComponentType,
    /// Always `None` for 8-bit components.
    endianness: Option<Endianness>,
}

impl Datatype {
    pub fn new(complex: bool, component: ComponentType, endianness: Endianness) -> Self {
        let endianness = (component.bytes() > 1).then_some(endianness);
        Datatype {
            complex,
            component,
            endianness,
        }
    }

    pub fn parse(token: &str) -> Result<Self, DatatypeError> {
        let invalid = || DatatypeError::InvalidDatatype(token.to_string());

        let (complex, rest) = if let Some(rest) = token.strip_prefix('c') {
            (true, rest)
        } else if let Some(rest) = token.strip_prefix('r') {
            (false, rest)
        } else {
            return Err(invalid());
        };

        let (rest, suffix) = if let Some(rest) = rest.strip_suffix("_le") {
            (rest, Some(Endianness::Little))
        } else if let Some(rest) = rest.strip_suffix("_be") {
            (rest, Some(Endianness::Big))
        } else {
            (rest, None)
        };

        let component = ComponentType::from_token(rest).ok_or_else(invalid)?;
        Ok(Datatype::new(
            complex,
            component,
            suffix.unwrap_or(Endianness::Little),
        ))
    }

    pub fn is_complex(&self) -> bool {
        self.complex
    }

    pub fn component(&self) -> ComponentType {
        self.component
    }

    pub fn format(&self) -> SampleFormat {
        self.component.format()
    }

    pub fn is_signed(&self) -> bool {
        self.component.is_signed()
    }

    pub fn bits_per_component(&self) -> u32 {
        self.component.bits()
    }

    pub fn bytes_per_component(&self) -> usize {
        self.component.bytes()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.component.bytes() * if self.complex { 2 } else { 1 }
    }

    /// Number of values a decoded sample occupies in an interleaved buffer.
    pub fn components_per_sample(&self) -> usize {
        if self.complex { 2 } else { 1 }
    }

    pub fn endianness(&self) -> Option<Endianness> {
        self.endianness
    }

    /// `None` for 8-bit components, where byte order is meaningless.
    pub fn is_little_endian(&self) -> Option<bool> {
        self.endianness.map(|e| e == Endianness::Little)
    }
}

/// Writes the canonical token: multi-byte types always carry their byte order suffix and 8-bit
/// types never do, so `ci16` prints as `ci16_le` and `cu8_be` as `cu8`. The token as written in
/// a metadata document is kept by [`Recording::datatype`](crate::metadata::Recording::datatype).
impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.complex { 'c' } else { 'r' };
        write!(f, "{}{}", kind, self.component.token())?;
        match self.endianness {
            Some(Endianness::Little) => write!(f, "_le"),
            Some(Endianness::Big) => write!(f, "_be"),
            None => Ok(()),
        }
    }
}

impl FromStr for Datatype {
    type Err = DatatypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Datatype::parse(s)
    }
}

#[cfg(test)]
mod datatype_tests {
    use super::*;

    #[test]
    fn parse_cf32_le() {
        let dt = Datatype::parse("cf32_le").unwrap();
        assert!(dt.is_complex());
        assert_eq!(dt.format(), SampleFormat::Float);
        assert!(dt.is_signed());
        assert_eq!(dt.bits_per_component(), 32);
        assert_eq!(dt.bytes_per_component(), 4);
        assert_eq!(dt.bytes_per_sample(), 8);
        assert_eq!(dt.is_little_endian(), Some(true));
        assert_eq!(dt.to_string(), "cf32_le");
    }

    #[test]
    fn parse_real_big_endian_unsigned() {
        let dt = Datatype::parse("ru16_be").unwrap();
        assert!(!dt.is_complex());
        assert_eq!(dt.format(), SampleFormat::Int);
        assert!(!dt.is_signed());
        assert_eq!(dt.bytes_per_sample(), 2);
        assert_eq!(dt.is_little_endian(), Some(false));
    }

    #[test]
    fn eight_bit_types_have_no_byte_order() {
        for token in ["cu8", "ci8", "ru8", "ri8", "ci8_le", "cu8_be"] {
            let dt = Datatype::parse(token).unwrap();
            assert_eq!(dt.is_little_endian(), None, "{token}");
            assert_eq!(dt.bits_per_component(), 8);
        }
        assert_eq!(Datatype::parse("cu8_be").unwrap().to_string(), "cu8");
    }

    #[test]
    fn bytes_per_sample_matches_width_and_complexity() {
        let cases = [
            ("cf64_le", 16),
            ("rf64_be", 8),
            ("ci32_le", 8),
            ("ri32_le", 4),
            ("ci16_be", 4),
            ("ru32_le", 4),
            ("cu8", 2),
            ("ri8", 1),
        ];
        for (token, bytes) in cases {
            assert_eq!(Datatype::parse(token).unwrap().bytes_per_sample(), bytes, "{token}");
        }
    }

    #[test]
    fn missing_suffix_reads_little_endian() {
        let dt = Datatype::parse("ci16").unwrap();
        assert_eq!(dt.is_little_endian(), Some(true));
        assert_eq!(dt.to_string(), "ci16_le");
        assert_eq!(Datatype::parse(&dt.to_string()).unwrap(), dt);
    }

    #[test]
    fn rejects_invalid_tokens() {
        for token in [
            "cx32_le", "cf128_le", "cf16_le", "xf32_le", "cf32_xe", "cf32le", "", "c", "CF32_LE",
            " cf32_le", "cu64_le", "ci8_",
        ] {
            assert_eq!(
                Datatype::parse(token),
                Err(DatatypeError::InvalidDatatype(token.to_string())),
                "{token}"
            );
        }
    }

    #[test]
    fn from_str_matches_parse() {
        let dt: Datatype = "ri16_le".parse().unwrap();
        assert_eq!(dt, Datatype::new(false, ComponentType::I16, Endianness::Little));
    }
}
