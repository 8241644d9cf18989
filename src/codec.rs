//! JSON encoding and decoding under an endpoint's key and date rules.
//!
//! Key rules rewrite every object key of the serialized JSON tree. Date rules
//! apply to [`Timestamp`] fields: the active rule is installed for the duration of
//! one encode or decode call, and `Timestamp`'s serde impls read it from there.

use crate::endpoint::Endpoint;
use crate::error::ApiError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use convert_case::{Case, Casing};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cell::RefCell;

/// How object keys are rewritten before a request body is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    /// Keys are sent as the type serializes them.
    #[default]
    UseDefaultKeys,
    /// `userId` is sent as `user_id`.
    ConvertToSnakeCase,
    /// `user_id` is sent as `userId`.
    ConvertToCamelCase,
}

/// How object keys are rewritten before a response is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDecoding {
    /// Keys are decoded as received.
    #[default]
    UseDefaultKeys,
    /// `user_id` is decoded as `userId`. Keys without `_` are untouched.
    ConvertFromSnakeCase,
    /// `userId` is decoded as `user_id`.
    ConvertFromCamelCase,
}

/// How [`Timestamp`] values are represented on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateRule {
    /// RFC 3339 strings, e.g. `2024-01-02T03:04:05Z`.
    #[default]
    Iso8601,
    /// Seconds since the Unix epoch, as a number.
    SecondsSince1970,
    /// Milliseconds since the Unix epoch, as a number.
    MillisecondsSince1970,
    /// A `chrono` format string, interpreted as UTC.
    Formatted(String),
}

thread_local! {
    static ACTIVE_DATE_RULE: RefCell<DateRule> = RefCell::new(DateRule::default());
}

/// Runs `f` with `rule` installed as the active date rule.
fn with_date_rule<R>(rule: &DateRule, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<DateRule>);

    impl Drop for Restore {
        fn drop(&mut self) {
            if let Some(previous) = self.0.take() {
                ACTIVE_DATE_RULE.with(|active| *active.borrow_mut() = previous);
            }
        }
    }

    let previous = ACTIVE_DATE_RULE.with(|active| active.replace(rule.clone()));
    let _restore = Restore(Some(previous));
    f()
}

fn active_date_rule() -> DateRule {
    ACTIVE_DATE_RULE.with(|active| active.borrow().clone())
}

/// A UTC instant whose wire format follows the endpoint's date rules.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use netpoint::Timestamp;
///
/// let ts = Timestamp::from(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
/// assert_eq!(ts.as_datetime().timestamp(), 1_704_164_645);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Returns the wrapped instant.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match active_date_rule() {
            DateRule::Iso8601 => {
                serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            DateRule::SecondsSince1970 => {
                serializer.serialize_f64(self.0.timestamp_millis() as f64 / 1000.0)
            }
            DateRule::MillisecondsSince1970 => {
                serializer.serialize_f64(self.0.timestamp_millis() as f64)
            }
            DateRule::Formatted(format) => {
                serializer.serialize_str(&self.0.format(&format).to_string())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let rule = active_date_rule();
        let parsed = match (&rule, &raw) {
            (DateRule::Iso8601, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(de::Error::custom)?,
            (DateRule::SecondsSince1970, Value::Number(n)) => {
                let secs = n
                    .as_f64()
                    .ok_or_else(|| de::Error::custom("timestamp is not a number"))?;
                from_millis((secs * 1000.0).round() as i64)?
            }
            (DateRule::MillisecondsSince1970, Value::Number(n)) => {
                let millis = n
                    .as_f64()
                    .ok_or_else(|| de::Error::custom("timestamp is not a number"))?;
                from_millis(millis.round() as i64)?
            }
            (DateRule::Formatted(format), Value::String(s)) => {
                parse_formatted(s, format).map_err(de::Error::custom)?
            }
            (rule, other) => {
                return Err(de::Error::custom(format!(
                    "expected a date encoded as {:?}, found {}",
                    rule, other
                )))
            }
        };
        Ok(Timestamp(parsed))
    }
}

/// Parses `s` with a `chrono` format that may carry an offset, a time, or only
/// a date. Date-only values are midnight UTC.
fn parse_formatted(s: &str, format: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_str(s, format) {
        return Ok(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(s, format) {
        Ok(dt) => Ok(dt.and_utc()),
        Err(err) => NaiveDate::parse_from_str(s, format)
            .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
            .map_err(|_| err),
    }
}

fn from_millis<E: de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| E::custom(format!("timestamp {millis}ms is out of range")))
}

fn rewrite_keys(value: Value, convert: &impl Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), rewrite_keys(v, convert)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rewrite_keys(v, convert)).collect())
        }
        other => other,
    }
}

fn apply_key_encoding(value: Value, rule: KeyEncoding) -> Value {
    match rule {
        KeyEncoding::UseDefaultKeys => value,
        KeyEncoding::ConvertToSnakeCase => rewrite_keys(value, &|k| k.to_case(Case::Snake)),
        KeyEncoding::ConvertToCamelCase => rewrite_keys(value, &|k| k.to_case(Case::Camel)),
    }
}

fn apply_key_decoding(value: Value, rule: KeyDecoding) -> Value {
    match rule {
        KeyDecoding::UseDefaultKeys => value,
        KeyDecoding::ConvertFromSnakeCase => rewrite_keys(value, &|k| {
            if k.contains('_') {
                k.to_case(Case::Camel)
            } else {
                k.to_string()
            }
        }),
        KeyDecoding::ConvertFromCamelCase => rewrite_keys(value, &|k| k.to_case(Case::Snake)),
    }
}

/// Produces the JSON tree of a request body under the given rules.
pub(crate) fn encode_value(
    produce: impl FnOnce() -> serde_json::Result<Value>,
    keys: KeyEncoding,
    dates: &DateRule,
) -> serde_json::Result<Value> {
    let value = with_date_rule(dates, produce)?;
    Ok(apply_key_encoding(value, keys))
}

/// Serializes `value` to JSON bytes under the given rules.
///
/// # Examples
///
/// ```
/// use netpoint::codec::{encode, DateRule, KeyEncoding};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct NewUser {
///     first_name: String,
/// }
///
/// let bytes = encode(
///     &NewUser { first_name: "Ada".to_string() },
///     KeyEncoding::ConvertToCamelCase,
///     &DateRule::Iso8601,
/// )
/// .unwrap();
/// assert_eq!(bytes, br#"{"firstName":"Ada"}"#);
/// ```
pub fn encode<T: Serialize + ?Sized>(
    value: &T,
    keys: KeyEncoding,
    dates: &DateRule,
) -> serde_json::Result<Vec<u8>> {
    let value = encode_value(|| serde_json::to_value(value), keys, dates)?;
    serde_json::to_vec(&value)
}

/// Decodes JSON bytes into `T` under the given rules.
///
/// An empty payload decodes as JSON `null`, so `()` and `Option<T>` accept it.
pub fn decode<T: DeserializeOwned>(
    bytes: &[u8],
    keys: KeyDecoding,
    dates: &DateRule,
) -> serde_json::Result<T> {
    let value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(bytes)?
    };
    let value = apply_key_decoding(value, keys);
    with_date_rule(dates, || serde_json::from_value(value))
}

/// Decodes a non-success payload into the typed error.
///
/// Never fails: anything that cannot be decoded yields `F::unknown(None)`.
pub fn decode_error<F: ApiError>(endpoint: &Endpoint, bytes: &[u8]) -> F {
    decode::<F>(bytes, endpoint.key_decoding(), endpoint.date_decoding())
        .unwrap_or_else(|_| F::unknown(None))
}
