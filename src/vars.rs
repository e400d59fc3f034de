use std::collections::HashMap;

use serde_json_path::JsonPath;
use serde_json::Value;
use tracing::debug;

use crate::error::EvalError;
use crate::spec::Variables;

/// Extracts every variable from the response body and stores it in `sink`
/// under the variable's name.
pub fn save_vars(
    vars: &Variables,
    body: &[u8],
    sink: &mut HashMap<String, Value>,
) -> Result<(), EvalError> {
    if vars.is_empty() || body.is_empty() {
        return Ok(());
    }
    let document: Value = serde_json::from_slice(body).map_err(EvalError::DecodeBody)?;
    for (name, entry) in vars {
        let extracted = extract_from(&entry.from, &document)?;
        debug!("save.vars: {} -> {}", name, extracted);
        sink.insert(name.clone(), extracted);
    }
    Ok(())
}

fn extract_from(path: &str, document: &Value) -> Result<Value, EvalError> {
    match document {
        Value::Object(_) => {}
        Value::Array(items) if items.iter().all(Value::is_object) => {}
        Value::Array(_) => return Err(EvalError::UnsupportedBodyShape("array of non-objects")),
        Value::String(_) => return Err(EvalError::UnsupportedBodyShape("string")),
        Value::Number(_) => return Err(EvalError::UnsupportedBodyShape("number")),
        Value::Bool(_) => return Err(EvalError::UnsupportedBodyShape("bool")),
        Value::Null => return Err(EvalError::UnsupportedBodyShape("null")),
    }
    // Expressions are validated at parse time, so a failure here means the
    // path simply selects nothing.
    let not_found = || EvalError::PathNotFound {
        path: path.to_string(),
    };
    JsonPath::parse(path)
        .map_err(|_| not_found())?
        .query(document)
        .first()
        .cloned()
        .ok_or_else(not_found)
}
