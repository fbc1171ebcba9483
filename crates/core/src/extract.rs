use crate::error::MalformedResponse;

/// Model answers larger than this are rejected before any scanning.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Returns the first JSON object embedded in free-form model output.
///
/// Leading prose, markdown fences and trailing commentary are ignored. The
/// scan starts at the first `{` and stops at its balanced `}`, skipping braces
/// that appear inside JSON strings. When the braces never balance, the slice
/// up to the last `}` is returned and left for the JSON parser to judge.
pub fn extract_json_object(text: &str) -> Result<&str, MalformedResponse> {
    if text.len() > MAX_RESPONSE_BYTES {
        return Err(MalformedResponse::TooLarge {
            len: text.len(),
            max: MAX_RESPONSE_BYTES,
        });
    }

    let start = text.find('{').ok_or(MalformedResponse::NoJsonObject)?;
    let candidate = &text[start..];

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in candidate.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&candidate[..=offset]);
                }
            }
            _ => {}
        }
    }

    let end = candidate.rfind('}').ok_or(MalformedResponse::NoJsonObject)?;
    Ok(&candidate[..=end])
}

/// Extracts and deserializes the embedded object in one step.
pub fn parse_embedded<T>(text: &str) -> Result<T, MalformedResponse>
where
    T: serde::de::DeserializeOwned,
{
    let raw = extract_json_object(text)?;
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prose_and_code_fences() {
        let text = "Voici les coordonnées:\n```json\n{\"latitude\": 4.05, \"longitude\": 9.7}\n```\nBon voyage!";
        assert_eq!(
            extract_json_object(text).unwrap(),
            "{\"latitude\": 4.05, \"longitude\": 9.7}"
        );
    }

    #[test]
    fn stops_at_first_balanced_object() {
        let text = "{\"a\": {\"b\": 1}} then {\"c\": 2}";
        assert_eq!(extract_json_object(text).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn ignores_braces_inside_strings() {
        let text = "{\"route\": \"prendre la sortie }{ nord\", \"n\": \"\\\"}\"}";
        assert_eq!(extract_json_object(text).unwrap(), text);
    }

    #[test]
    fn unbalanced_input_falls_back_to_last_brace() {
        let text = "prefix {\"a\": {\"b\": 1} suffix";
        assert_eq!(extract_json_object(text).unwrap(), "{\"a\": {\"b\": 1}");
    }

    #[test]
    fn rejects_text_without_object() {
        assert!(matches!(
            extract_json_object("désolé, je ne sais pas"),
            Err(MalformedResponse::NoJsonObject)
        ));
    }

    #[test]
    fn rejects_oversized_responses() {
        let text = format!("{{\"pad\": \"{}\"}}", "x".repeat(MAX_RESPONSE_BYTES));
        assert!(matches!(
            extract_json_object(&text),
            Err(MalformedResponse::TooLarge { .. })
        ));
    }
}
