use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::attributes::TypedAttributeMap;

pub const DYNAMODB_EVENT_SOURCE: &str = "aws:dynamodb";
pub const RECORD_ID_ATTRIBUTE: &str = "id";
pub const SUCCESS_MESSAGE: &str = "Files Upload";
pub const FAILURE_MESSAGE: &str = "Failed to Upload";

/// Batch envelope delivered by the stream event source mapping.
///
/// Records stay raw here so a malformed entry fails only when the loop
/// reaches it, after the records before it were written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    #[serde(rename = "Records")]
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventName {
    Insert,
    Modify,
    Remove,
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// One stream entry. Only `dynamodb.NewImage` is decoded strictly; the
/// remaining fields feed logging and fall back to their default when the
/// stream sends an unexpected shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChangeRecord {
    #[serde(rename = "eventID", default, deserialize_with = "lenient")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName", default, deserialize_with = "lenient")]
    pub event_name: EventName,
    #[serde(rename = "eventVersion", default, deserialize_with = "lenient")]
    pub event_version: Option<String>,
    #[serde(rename = "eventSource", default, deserialize_with = "lenient")]
    pub event_source: Option<String>,
    #[serde(rename = "awsRegion", default, deserialize_with = "lenient")]
    pub aws_region: Option<String>,
    #[serde(rename = "eventSourceARN", default, deserialize_with = "lenient")]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub dynamodb: Option<StreamRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub keys: Option<TypedAttributeMap>,
    #[serde(default)]
    pub new_image: Option<TypedAttributeMap>,
    #[serde(default, deserialize_with = "lenient")]
    pub old_image: Option<TypedAttributeMap>,
    #[serde(default, deserialize_with = "lenient")]
    pub sequence_number: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub stream_view_type: Option<String>,
    /// Epoch seconds, fractional.
    #[serde(default, deserialize_with = "lenient")]
    pub approximate_creation_date_time: Option<f64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

impl ChangeRecord {
    pub fn new_image(&self) -> Option<&TypedAttributeMap> {
        self.dynamodb.as_ref()?.new_image.as_ref()
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.dynamodb.as_ref()?.sequence_number.as_deref()
    }

    pub fn approximate_creation_epoch_secs(&self) -> Option<f64> {
        self.dynamodb.as_ref()?.approximate_creation_date_time
    }

    pub fn is_dynamodb_source(&self) -> bool {
        self.event_source.as_deref() == Some(DYNAMODB_EVENT_SOURCE)
    }
}

/// Object key stem for a deserialized object.
///
/// Strings are used verbatim and numbers keep the decimal text the stream
/// sent (`4.20` stays `4.20`); any other shape, or an empty string, yields
/// `None`.
pub fn record_id(object: &Map<String, Value>) -> Option<String> {
    match object.get(RECORD_ID_ATTRIBUTE)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvocationStatus {
    Success,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResult {
    #[serde(rename = "STATUS")]
    pub status: InvocationStatus,
    #[serde(rename = "MESSAGE")]
    pub message: String,
    #[serde(rename = "RECORDS_WRITTEN", default)]
    pub records_written: usize,
    #[serde(
        rename = "ERROR_KIND",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_kind: Option<String>,
}

impl InvocationResult {
    pub fn success(records_written: usize) -> Self {
        Self {
            status: InvocationStatus::Success,
            message: SUCCESS_MESSAGE.to_string(),
            records_written,
            error_kind: None,
        }
    }

    pub fn failure(records_written: usize, error_kind: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Fail,
            message: FAILURE_MESSAGE.to_string(),
            records_written,
            error_kind: Some(error_kind.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_stream_record_shape() {
        let record: ChangeRecord = serde_json::from_value(json!({
            "eventID": "b8707f757d728b209879b4cf24091f29",
            "eventName": "INSERT",
            "eventVersion": "1.1",
            "eventSource": "aws:dynamodb",
            "awsRegion": "us-east-1",
            "dynamodb": {
                "ApproximateCreationDateTime": 1679249737.0,
                "Keys": {"id": {"S": "1234"}},
                "NewImage": {"hello": {"S": "world"}, "id": {"S": "1234"}},
                "SequenceNumber": "3338700000000003613474165",
                "SizeBytes": 22,
                "StreamViewType": "NEW_AND_OLD_IMAGES"
            },
            "eventSourceARN": "arn:aws:dynamodb:us-east-1:123456789012:table/tb_sample_data/stream/2023-03-18T23:04:01.187"
        }))
        .expect("stream record should decode");

        assert_eq!(record.event_name, EventName::Insert);
        assert!(record.is_dynamodb_source());
        assert_eq!(record.sequence_number(), Some("3338700000000003613474165"));
        assert_eq!(record.approximate_creation_epoch_secs(), Some(1679249737.0));
        let image = record.new_image().expect("new image should be present");
        assert_eq!(image["hello"], json!({"S": "world"}));
    }

    #[test]
    fn remove_record_has_no_new_image() {
        let record: ChangeRecord = serde_json::from_value(json!({
            "eventName": "REMOVE",
            "dynamodb": {
                "Keys": {"id": {"S": "1"}},
                "OldImage": {"id": {"S": "1"}}
            }
        }))
        .expect("remove record should decode");

        assert_eq!(record.event_name, EventName::Remove);
        assert!(record.new_image().is_none());
    }

    #[test]
    fn unknown_event_name_is_not_an_error() {
        let record: ChangeRecord = serde_json::from_value(json!({"eventName": "TRUNCATE"}))
            .expect("unknown event name should decode");
        assert_eq!(record.event_name, EventName::Unknown);
        assert!(record.dynamodb.is_none());
    }

    #[test]
    fn mistyped_metadata_falls_back_to_defaults() {
        let record: ChangeRecord = serde_json::from_value(json!({
            "eventID": 7,
            "eventName": ["INSERT"],
            "eventVersion": 1.1,
            "awsRegion": null,
            "eventSource": "aws:dynamodb",
            "dynamodb": {
                "Keys": "id",
                "NewImage": {"id": {"S": "1"}},
                "SequenceNumber": true,
                "SizeBytes": 22.0,
                "ApproximateCreationDateTime": "yesterday"
            }
        }))
        .expect("mistyped metadata should not fail the record");

        assert_eq!(record.event_id, None);
        assert_eq!(record.event_name, EventName::Unknown);
        assert_eq!(record.event_version, None);
        assert_eq!(record.aws_region, None);
        assert!(record.is_dynamodb_source());
        assert_eq!(record.sequence_number(), None);
        assert_eq!(record.approximate_creation_epoch_secs(), None);
        let stream_record = record.dynamodb.as_ref().expect("dynamodb body should decode");
        assert_eq!(stream_record.keys, None);
        assert_eq!(stream_record.size_bytes, None);
        assert_eq!(
            record.new_image().expect("new image should be present")["id"],
            json!({"S": "1"})
        );
    }

    #[test]
    fn malformed_new_image_still_fails_decoding() {
        let decoded = serde_json::from_value::<ChangeRecord>(json!({
            "eventName": "INSERT",
            "dynamodb": {"NewImage": ["id"]}
        }));
        assert!(decoded.is_err());
    }

    #[test]
    fn record_id_accepts_strings_and_numbers() {
        let string_id = json!({"id": "42"});
        assert_eq!(
            record_id(string_id.as_object().expect("object")),
            Some("42".to_string())
        );

        let number_id = json!({"id": 42});
        assert_eq!(
            record_id(number_id.as_object().expect("object")),
            Some("42".to_string())
        );

        let untagged = crate::attributes::deserialize_image(
            json!({"id": {"N": "4.20"}})
                .as_object()
                .expect("object"),
        )
        .expect("numeric id should untag");
        assert_eq!(record_id(&untagged), Some("4.20".to_string()));

        for missing in [json!({}), json!({"id": ""}), json!({"id": null}), json!({"id": ["a"]})] {
            assert_eq!(record_id(missing.as_object().expect("object")), None);
        }
    }

    #[test]
    fn invocation_result_uses_upper_case_keys() {
        let success = serde_json::to_value(InvocationResult::success(2))
            .expect("result should serialize");
        assert_eq!(
            success,
            json!({"STATUS": "SUCCESS", "MESSAGE": "Files Upload", "RECORDS_WRITTEN": 2})
        );

        let failure = serde_json::to_value(InvocationResult::failure(1, "image_missing"))
            .expect("result should serialize");
        assert_eq!(
            failure,
            json!({
                "STATUS": "FAIL",
                "MESSAGE": "Failed to Upload",
                "RECORDS_WRITTEN": 1,
                "ERROR_KIND": "image_missing"
            })
        );
    }
}
