use serde_json::{Map, Value};

use crate::error::{Result, ServiceError};
use crate::model::ReasoningChain;

impl ReasoningChain {
  /// Decode a model reply into a chain.
  ///
  /// The reply must contain one JSON object with all four sections as
  /// non-empty strings. A surrounding code fence or prose is tolerated; a
  /// missing or blank section is not, and nothing is repaired.
  pub fn parse(raw: &str) -> Result<Self> {
    let object = match serde_json::from_str::<Value>(locate_object(raw)?) {
      Ok(Value::Object(object)) => object,
      Ok(_) => return Err(ServiceError::malformed("reply is not a JSON object")),
      Err(e) => return Err(ServiceError::malformed(format!("reply is not valid JSON: {e}"))),
    };

    let [problem_decomposition, data, method, conclusion] =
      Self::FIELDS.map(|name| section(&object, name));
    Ok(Self {
      problem_decomposition: problem_decomposition?,
      data: data?,
      method: method?,
      conclusion: conclusion?,
    })
  }
}

fn locate_object(raw: &str) -> Result<&str> {
  match (raw.find('{'), raw.rfind('}')) {
    (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
    _ => Err(ServiceError::malformed("reply contains no JSON object")),
  }
}

fn section(object: &Map<String, Value>, name: &str) -> Result<String> {
  match object.get(name) {
    Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
    Some(Value::String(_)) => Err(ServiceError::malformed(format!("section '{name}' is empty"))),
    Some(_) => Err(ServiceError::malformed(format!("section '{name}' is not a string"))),
    None => Err(ServiceError::malformed(format!("missing section '{name}'"))),
  }
}
