//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::fmt;

/// OPC UA status code. The high bit marks a bad result.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u32);

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    pub const BAD_USER_ACCESS_DENIED: StatusCode = StatusCode(0x801F_0000);
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    pub const BAD_INDEX_RANGE_INVALID: StatusCode = StatusCode(0x8036_0000);
    pub const BAD_INDEX_RANGE_NO_DATA: StatusCode = StatusCode(0x8037_0000);
    pub const BAD_DATA_ENCODING_INVALID: StatusCode = StatusCode(0x8038_0000);
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    pub const BAD_METHOD_INVALID: StatusCode = StatusCode(0x8075_0000);
    pub const BAD_ARGUMENTS_MISSING: StatusCode = StatusCode(0x8076_0000);
    pub const BAD_TOO_MANY_ARGUMENTS: StatusCode = StatusCode(0x80E5_0000);

    /// Raw numeric value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when the severity bits are zero.
    pub const fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// True when the severity is bad.
    pub const fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Symbolic name for the codes this server produces.
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::GOOD => "Good",
            StatusCode::BAD_USER_ACCESS_DENIED => "BadUserAccessDenied",
            StatusCode::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            StatusCode::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            StatusCode::BAD_INDEX_RANGE_INVALID => "BadIndexRangeInvalid",
            StatusCode::BAD_INDEX_RANGE_NO_DATA => "BadIndexRangeNoData",
            StatusCode::BAD_DATA_ENCODING_INVALID => "BadDataEncodingInvalid",
            StatusCode::BAD_NOT_WRITABLE => "BadNotWritable",
            StatusCode::BAD_TYPE_MISMATCH => "BadTypeMismatch",
            StatusCode::BAD_METHOD_INVALID => "BadMethodInvalid",
            StatusCode::BAD_ARGUMENTS_MISSING => "BadArgumentsMissing",
            StatusCode::BAD_TOO_MANY_ARGUMENTS => "BadTooManyArguments",
            _ => "Unknown",
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::GOOD
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
