//! Conversion between AMQP field tables and [`Headers`].
//!
//! Integer widths are not preserved exactly. 8- and 16-bit integers (signed
//! or not) are read as `Int32` and `u32` as `Int64`, and both are written
//! back as `LongInt` / `LongLongInt`. The numeric value of an allowlisted
//! header survives a replay; its wire width may grow. `LongInt` and
//! `LongLongInt`, the widths producers use for `x-dlq-retry-count`, round-trip
//! unchanged.

use lapin::types::{AMQPValue, ByteArray, FieldTable, LongString, ShortString};
use tracing::debug;

use lazarus_core::{HeaderValue, Headers};

/// Convert a single AMQP field value.
///
/// Every integer width collapses onto `Int32` or `Int64`; nested tables,
/// arrays, decimals, and void values have no counterpart and yield `None`.
pub(crate) fn from_amqp(value: &AMQPValue) -> Option<HeaderValue> {
    let converted = match value {
        AMQPValue::ShortShortInt(v) => HeaderValue::Int32(i32::from(*v)),
        AMQPValue::ShortShortUInt(v) => HeaderValue::Int32(i32::from(*v)),
        AMQPValue::ShortInt(v) => HeaderValue::Int32(i32::from(*v)),
        AMQPValue::ShortUInt(v) => HeaderValue::Int32(i32::from(*v)),
        AMQPValue::LongInt(v) => HeaderValue::Int32(*v),
        AMQPValue::LongUInt(v) => HeaderValue::Int64(i64::from(*v)),
        AMQPValue::LongLongInt(v) => HeaderValue::Int64(*v),
        AMQPValue::Boolean(v) => HeaderValue::Bool(*v),
        AMQPValue::Float(v) => HeaderValue::Float(f64::from(*v)),
        AMQPValue::Double(v) => HeaderValue::Float(*v),
        AMQPValue::Timestamp(v) => HeaderValue::Timestamp(*v),
        AMQPValue::ShortString(s) => HeaderValue::Text(s.as_str().to_owned()),
        AMQPValue::LongString(s) => match std::str::from_utf8(s.as_bytes()) {
            Ok(text) => HeaderValue::Text(text.to_owned()),
            Err(_) => HeaderValue::Bytes(s.as_bytes().to_vec()),
        },
        AMQPValue::ByteArray(b) => HeaderValue::Bytes(b.as_slice().to_vec()),
        _ => return None,
    };
    Some(converted)
}

pub(crate) fn to_amqp(value: &HeaderValue) -> AMQPValue {
    match value {
        HeaderValue::Int32(v) => AMQPValue::LongInt(*v),
        HeaderValue::Int64(v) => AMQPValue::LongLongInt(*v),
        HeaderValue::Text(s) => AMQPValue::LongString(LongString::from(s.as_str())),
        HeaderValue::Bool(v) => AMQPValue::Boolean(*v),
        HeaderValue::Float(v) => AMQPValue::Double(*v),
        HeaderValue::Timestamp(v) => AMQPValue::Timestamp(*v),
        HeaderValue::Bytes(b) => AMQPValue::ByteArray(ByteArray::from(b.clone())),
    }
}

/// Read a message's header table. Unsupported values are skipped.
pub(crate) fn headers_from_table(table: Option<&FieldTable>) -> Headers {
    let Some(table) = table else {
        return Headers::new();
    };
    table
        .inner()
        .iter()
        .filter_map(|(key, value)| {
            let converted = from_amqp(value);
            if converted.is_none() {
                debug!(header = %key.as_str(), "skipping header with unsupported AMQP type");
            }
            converted.map(|v| (key.as_str().to_owned(), v))
        })
        .collect()
}

pub(crate) fn headers_to_table(headers: &Headers) -> FieldTable {
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(ShortString::from(key.as_str()), to_amqp(value));
    }
    table
}
