use serde_json::Value;
use thiserror::Error;

/// The response had a value of the wrong shape where text was expected.
/// Absent fields are not errors; they yield empty text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("response is not a JSON object")]
    ResponseNotObject,

    #[error("'candidates' is not an array")]
    CandidatesNotArray,

    #[error("candidate is not an object")]
    CandidateNotObject,

    #[error("'content' is not an object")]
    ContentNotObject,

    #[error("'parts' is not an array")]
    PartsNotArray,

    #[error("part {0} is not an object")]
    PartNotObject(usize),

    #[error("'text' of part {0} is not a string")]
    TextNotString(usize),
}

/// Concatenate the text parts of the first candidate.
///
/// Missing `candidates`, `content` or `parts` give an empty string, as does
/// a top-level array (it has no `candidates` key).
pub fn extract_text(response: &Value) -> Result<String, ExtractionError> {
    let root = match response {
        Value::Object(root) => root,
        Value::Array(_) => return Ok(String::new()),
        _ => return Err(ExtractionError::ResponseNotObject),
    };

    let candidates = match root.get("candidates") {
        None => return Ok(String::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ExtractionError::CandidatesNotArray),
    };

    let Some(first) = candidates.first() else {
        return Ok(String::new());
    };
    let Value::Object(candidate) = first else {
        return Err(ExtractionError::CandidateNotObject);
    };

    let content = match candidate.get("content") {
        None => return Ok(String::new()),
        Some(Value::Object(content)) => content,
        Some(_) => return Err(ExtractionError::ContentNotObject),
    };

    let parts = match content.get("parts") {
        None => return Ok(String::new()),
        Some(Value::Array(parts)) => parts,
        Some(_) => return Err(ExtractionError::PartsNotArray),
    };

    let mut text = String::new();
    for (index, part) in parts.iter().enumerate() {
        let Value::Object(part) = part else {
            return Err(ExtractionError::PartNotObject(index));
        };
        match part.get("text") {
            None => continue,
            Some(Value::String(fragment)) => text.push_str(fragment),
            Some(_) => return Err(ExtractionError::TextNotString(index)),
        }
    }

    Ok(text)
}
