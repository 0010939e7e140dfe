//! Best-effort decoding of structured data out of free-form model output.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response was empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remove one wrapping ```` ``` ```` / ```` ```json ```` fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = match body.find('\n') {
        Some(nl) if body[..nl].chars().all(|c| c.is_ascii_alphanumeric()) => &body[nl + 1..],
        _ => body,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Decode `raw` as `T`, tolerating a code fence, prose around the payload and
/// trailing commas.
///
/// The error of the first strict attempt is returned when repair fails too.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }

    let strict = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let Some(candidate) = outermost_json(text) else {
        return Err(strict.into());
    };
    let repaired = strip_trailing_commas(candidate);
    serde_json::from_str(&repaired).map_err(|_| strict.into())
}

/// The slice from the first `{`/`[` to the last matching closer.
fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Drop commas that directly precede `}` or `]`, ignoring string contents.
fn strip_trailing_commas(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut result = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                result.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    result.push(ch);
                }
            }
            _ => result.push(ch),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: u32,
        #[serde(default)]
        b: Option<String>,
    }

    #[test]
    fn fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn decodes_plain_and_fenced() {
        let p: Pair = decode_json(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(p.a, 1);
        let p: Pair = decode_json("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(p, Pair { a: 2, b: None });
    }

    #[test]
    fn repairs_surrounding_prose_and_trailing_commas() {
        let raw = "Here you go:\n{\"a\": 3, \"b\": \"x, }\",}\nHope that helps.";
        let p: Pair = decode_json(raw).unwrap();
        assert_eq!(p.a, 3);
        assert_eq!(p.b.as_deref(), Some("x, }"));

        let v: Value = decode_json("[1, 2, 3,]").unwrap();
        assert_eq!(v, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn empty_and_prose_fail() {
        assert!(matches!(decode_json::<Value>("   "), Err(DecodeError::Empty)));
        assert!(matches!(
            decode_json::<Value>("I could not find any requirements."),
            Err(DecodeError::Json(_))
        ));
    }
}
