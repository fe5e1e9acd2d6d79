use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::IngestError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct StorageEvent {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Extracts the `(bucket, key)` pairs of an object-created notification, in
/// record order, with keys URL-decoded.
pub fn parse_storage_event(payload: &[u8]) -> Result<Vec<ObjectRef>, IngestError> {
    let event: StorageEvent = serde_json::from_slice(payload)
        .map_err(|err| IngestError::Parse(format!("storage event: {err}")))?;
    event
        .records
        .into_iter()
        .map(|record| {
            Ok(ObjectRef {
                bucket: record.s3.bucket.name,
                key: decode_object_key(&record.s3.object.key)?,
            })
        })
        .collect()
}

/// Notification keys are form-encoded: `+` is a space, then `%XX` escapes.
pub fn decode_object_key(raw: &str) -> Result<String, IngestError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|err| IngestError::Parse(format!("object key is not utf-8: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_extracted_in_order_with_decoded_keys() {
        let payload = br#"{"Records":[
            {"s3":{"bucket":{"name":"rok-data"},"object":{"key":"inbox/source%3Drok_players/kingdom%3D51/dt%3D2026-01-26/day+one.csv","size":12}}},
            {"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"rok-data"},"object":{"key":"inbox/source=rok_players/kingdom=52/dt=2026-01-26/b.json"}}}
        ]}"#;
        let refs = parse_storage_event(payload).unwrap();
        assert_eq!(
            refs,
            vec![
                ObjectRef {
                    bucket: "rok-data".into(),
                    key: "inbox/source=rok_players/kingdom=51/dt=2026-01-26/day one.csv".into(),
                },
                ObjectRef {
                    bucket: "rok-data".into(),
                    key: "inbox/source=rok_players/kingdom=52/dt=2026-01-26/b.json".into(),
                },
            ]
        );
    }

    #[test]
    fn encoded_plus_survives_decoding() {
        assert_eq!(decode_object_key("a%2Bb+c").unwrap(), "a+b c");
    }

    #[test]
    fn missing_records_yield_nothing_and_garbage_is_rejected() {
        assert!(parse_storage_event(b"{}").unwrap().is_empty());
        assert!(matches!(
            parse_storage_event(b"[1,2]"),
            Err(IngestError::Parse(_))
        ));
        assert!(matches!(
            decode_object_key("%FF"),
            Err(IngestError::Parse(_))
        ));
    }
}
