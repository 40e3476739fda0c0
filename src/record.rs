//! Shape of a secret as it sits in settings storage

use crate::error::{ErrorCategory, ErrorKind, KeystoreError, Result};
use serde::Serialize;
use serde_json::Value;

/// One encrypted setting: `{"encrypted": true, "data": "<envelope>", "timestamp": <ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecord {
    pub encrypted: bool,
    /// Armored envelope.
    pub data: String,
    /// Milliseconds since the Unix epoch when the record was written.
    /// Advisory only.
    pub timestamp: i64,
}

impl StoredRecord {
    pub fn new(envelope: String, timestamp: i64) -> Self {
        Self {
            encrypted: true,
            data: envelope,
            timestamp,
        }
    }

    /// Interpret a raw storage value as a record.
    ///
    /// Fails with [`ErrorKind::MalformedRecord`] if the value is not an
    /// object, `encrypted` is not `true`, or `data` is missing or empty.
    /// A missing or non-integer timestamp is tolerated and read as 0.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| malformed("stored value is not an object"))?;

        if obj.get("encrypted").and_then(Value::as_bool) != Some(true) {
            return Err(malformed("record is not flagged as encrypted"));
        }

        let data = match obj.get("data").and_then(Value::as_str) {
            Some(data) if !data.is_empty() => data.to_string(),
            _ => return Err(malformed("record has no envelope data")),
        };

        let timestamp = obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0);

        Ok(Self {
            encrypted: true,
            data,
            timestamp,
        })
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            KeystoreError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                "failed to serialize record",
                e,
            )
        })
    }
}

fn malformed(msg: &str) -> KeystoreError {
    KeystoreError::with_kind(ErrorCategory::Internal, ErrorKind::MalformedRecord, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_shape() {
        let record = StoredRecord::new("QUJD".to_string(), 1_700_000_000_000);
        let value = record.to_value().unwrap();
        assert_eq!(
            value,
            json!({"encrypted": true, "data": "QUJD", "timestamp": 1_700_000_000_000i64})
        );
        assert_eq!(StoredRecord::from_value(&value).unwrap(), record);
    }

    #[test]
    fn test_missing_data_is_malformed() {
        let err = StoredRecord::from_value(&json!({"encrypted": true, "timestamp": 1})).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedRecord));
    }

    #[test]
    fn test_empty_data_is_malformed() {
        let err = StoredRecord::from_value(&json!({"encrypted": true, "data": ""})).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedRecord));
    }

    #[test]
    fn test_unencrypted_flag_is_malformed() {
        for value in [
            json!({"encrypted": false, "data": "QUJD"}),
            json!({"data": "QUJD"}),
            json!({"encrypted": "true", "data": "QUJD"}),
        ] {
            let err = StoredRecord::from_value(&value).unwrap_err();
            assert_eq!(err.kind, Some(ErrorKind::MalformedRecord), "{}", value);
        }
    }

    #[test]
    fn test_non_object_is_malformed() {
        for value in [json!("sk-plain"), json!(null), json!([1, 2]), json!(7)] {
            assert!(StoredRecord::from_value(&value).is_err(), "{}", value);
        }
    }

    #[test]
    fn test_missing_timestamp_tolerated() {
        let record = StoredRecord::from_value(&json!({"encrypted": true, "data": "QUJD"})).unwrap();
        assert_eq!(record.timestamp, 0);
    }
}
