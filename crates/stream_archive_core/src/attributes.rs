//! Untagging of DynamoDB typed attribute values.
//!
//! A stream image wraps every attribute in a single-key object naming its
//! type (`{"S": "text"}`, `{"N": "3"}`, `{"M": {...}}`). The functions here
//! strip those wrappers and produce plain JSON values.

use serde_json::{Map, Number, Value};

pub type TypedAttributeMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeError {
    path: String,
    reason: String,
}

impl AttributeError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Location of the offending attribute, e.g. `locations[1].lat`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for AttributeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attribute '{}': {}", self.path, self.reason)
    }
}

impl std::error::Error for AttributeError {}

/// Untags every attribute of a stream image. Every key of the input is
/// present in the output.
pub fn deserialize_image(image: &TypedAttributeMap) -> Result<Map<String, Value>, AttributeError> {
    let mut plain = Map::with_capacity(image.len());
    for (name, typed) in image {
        plain.insert(name.clone(), untag(typed, name)?);
    }
    Ok(plain)
}

pub fn deserialize_attribute(typed: &Value) -> Result<Value, AttributeError> {
    untag(typed, "$")
}

fn untag(typed: &Value, path: &str) -> Result<Value, AttributeError> {
    let Some(wrapper) = typed.as_object() else {
        return Err(AttributeError::new(
            path,
            "typed attribute must be a JSON object",
        ));
    };

    let mut entries = wrapper.iter();
    let (tag, payload) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        (None, _) => return Err(AttributeError::new(path, "typed attribute has no type tag")),
        (Some(_), Some(_)) => {
            return Err(AttributeError::new(
                path,
                "typed attribute must carry exactly one type tag",
            ))
        }
    };

    match tag.as_str() {
        "S" | "B" => expect_str(payload, tag, path).map(|text| Value::String(text.to_string())),
        "N" => parse_number(expect_str(payload, tag, path)?, path),
        "BOOL" => payload
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| AttributeError::new(path, "BOOL payload must be a boolean")),
        "NULL" => match payload {
            Value::Bool(true) => Ok(Value::Null),
            _ => Err(AttributeError::new(path, "NULL payload must be true")),
        },
        "M" => {
            let Some(fields) = payload.as_object() else {
                return Err(AttributeError::new(path, "M payload must be an object"));
            };
            let mut plain = Map::with_capacity(fields.len());
            for (name, nested) in fields {
                plain.insert(name.clone(), untag(nested, &format!("{path}.{name}"))?);
            }
            Ok(Value::Object(plain))
        }
        "L" => expect_array(payload, tag, path)?
            .iter()
            .enumerate()
            .map(|(index, nested)| untag(nested, &format!("{path}[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "SS" | "BS" => expect_array(payload, tag, path)?
            .iter()
            .enumerate()
            .map(|(index, member)| {
                expect_str(member, tag, &format!("{path}[{index}]"))
                    .map(|text| Value::String(text.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "NS" => expect_array(payload, tag, path)?
            .iter()
            .enumerate()
            .map(|(index, member)| {
                let member_path = format!("{path}[{index}]");
                parse_number(expect_str(member, tag, &member_path)?, &member_path)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(AttributeError::new(
            path,
            format!("unsupported type tag '{other}'"),
        )),
    }
}

fn expect_str<'a>(payload: &'a Value, tag: &str, path: &str) -> Result<&'a str, AttributeError> {
    payload
        .as_str()
        .ok_or_else(|| AttributeError::new(path, format!("{tag} payload must be a string")))
}

fn expect_array<'a>(
    payload: &'a Value,
    tag: &str,
    path: &str,
) -> Result<&'a Vec<Value>, AttributeError> {
    payload
        .as_array()
        .ok_or_else(|| AttributeError::new(path, format!("{tag} payload must be an array")))
}

// DynamoDB transmits numbers as decimal strings of up to 38 significant
// digits. `arbitrary_precision` keeps that text verbatim; forms outside the
// JSON number grammar (`+5`, `.5`) fall back to f64.
fn parse_number(raw: &str, path: &str) -> Result<Value, AttributeError> {
    let exact = raw
        .parse::<Number>()
        .ok()
        .filter(|number| number.as_f64().is_some_and(f64::is_finite));
    if let Some(number) = exact {
        return Ok(Value::Number(number));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AttributeError::new(path, format!("'{raw}' is not a finite number")))
}
