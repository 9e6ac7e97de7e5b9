//! ---
//! bas_section: "05-networking-external-interfaces"
//! bas_subsection: "module"
//! bas_type: "source"
//! bas_scope: "code"
//! bas_description: "OPC UA address-space surface consumed by node managers."
//! bas_version: "v0.0.0-prealpha"
//! bas_owner: "tbd"
//! ---
use std::str::FromStr;

use crate::node_id::QualifiedName;
use crate::status::StatusCode;
use crate::variant::{DataValue, Variant};

const DEFAULT_BINARY: &str = "Default Binary";

/// Single-dimension numeric range, `n` or `a:b` with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl FromStr for IndexRange {
    type Err = StatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| StatusCode::BAD_INDEX_RANGE_INVALID)
        };
        if s.contains(',') {
            return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
        }
        match s.split_once(':') {
            None => Ok(Self {
                start: parse(s)?,
                end: None,
            }),
            Some((start, end)) => {
                let start = parse(start)?;
                let end = parse(end)?;
                if start >= end {
                    return Err(StatusCode::BAD_INDEX_RANGE_INVALID);
                }
                Ok(Self {
                    start,
                    end: Some(end),
                })
            }
        }
    }
}

impl IndexRange {
    /// Extract the sub-range of an array or string value.
    pub fn apply(&self, value: &Variant) -> Result<Variant, StatusCode> {
        match value {
            Variant::Array(items) => {
                let (start, end) = self.bounds(items.len())?;
                Ok(Variant::Array(items[start..=end].to_vec()))
            }
            Variant::String(text) => {
                let chars: Vec<char> = text.chars().collect();
                let (start, end) = self.bounds(chars.len())?;
                Ok(Variant::String(chars[start..=end].iter().collect()))
            }
            _ => Err(StatusCode::BAD_INDEX_RANGE_NO_DATA),
        }
    }

    fn bounds(&self, len: usize) -> Result<(usize, usize), StatusCode> {
        if self.start >= len {
            return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
        }
        let end = self.end.unwrap_or(self.start).min(len - 1);
        Ok((self.start, end))
    }
}

/// Apply a client-requested index range and data encoding to a value read
/// from a node. Failures replace the value with a bad status.
pub fn apply_index_range_and_encoding(
    value: DataValue,
    index_range: Option<&str>,
    data_encoding: Option<&QualifiedName>,
) -> DataValue {
    if !value.is_good() {
        return value;
    }
    if let Some(encoding) = data_encoding {
        if !encoding.is_null() && encoding.name != DEFAULT_BINARY {
            return DataValue::bad(StatusCode::BAD_DATA_ENCODING_INVALID);
        }
    }
    let Some(range) = index_range.filter(|r| !r.is_empty()) else {
        return value;
    };
    let Some(inner) = value.value.as_ref() else {
        return DataValue::bad(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    };
    match range.parse::<IndexRange>().and_then(|r| r.apply(inner)) {
        Ok(sliced) => DataValue {
            value: Some(sliced),
            ..value
        },
        Err(status) => DataValue::bad(status),
    }
}
