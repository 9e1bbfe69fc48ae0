//! Pulling code and JSON out of free-form generated text.

/// Strip a surrounding Markdown code fence, preferring a `python` fence.
/// Text without a fence is returned trimmed.
pub fn extract_code(text: &str) -> String {
    for opener in ["```python", "```py", "```"] {
        if let Some(start) = text.find(opener) {
            let body = &text[start + opener.len()..];
            // skip the remainder of the fence line (language tag)
            let body = match body.find('\n') {
                Some(newline) => &body[newline + 1..],
                None => body,
            };
            let end = body.find("```").unwrap_or(body.len());
            return body[..end].trim().to_string();
        }
    }
    text.trim().to_string()
}

/// The first balanced `{...}` object in `text`, honoring string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            return Some(&text[start..=end]);
        }
        search_from = start + 1;
    }
    None
}

/// Index of the `}` closing the object that opens at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The last well-formed JSON object in process output.
///
/// Lines are scanned from the end for one that parses as an object. If none
/// does, the span from the first `{` to the last `}` is tried, which covers
/// objects pretty-printed across several lines.
pub fn last_json_object(output: &str) -> Option<serde_json::Value> {
    for line in output.lines().rev() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(line) {
            return Some(value);
        }
    }

    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&output[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_python_fence() {
        let text = "Here is the script:\n```python\nimport pandas as pd\nprint(1)\n```\nDone.";
        assert_eq!(extract_code(text), "import pandas as pd\nprint(1)");
    }

    #[test]
    fn test_extract_bare_fence() {
        let text = "```\nprint('x')\n```";
        assert_eq!(extract_code(text), "print('x')");
    }

    #[test]
    fn test_extract_unfenced() {
        assert_eq!(extract_code("  print(2)\n"), "print(2)");
    }

    #[test]
    fn test_extract_json_object_with_prose_and_braces_in_strings() {
        let text = r#"Sure! {"passed": true, "explanation": "uses {braces}"} trailing"#;
        let obj = extract_json_object(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(obj).unwrap();
        assert_eq!(value["explanation"], "uses {braces}");
    }

    #[test]
    fn test_extract_json_object_unbalanced() {
        assert_eq!(extract_json_object("{ \"a\": 1"), None);
        assert_eq!(extract_json_object("no json"), None);
    }

    #[test]
    fn test_last_json_object_prefers_final_line() {
        let output = "loading...\n{\"passed\": false}\nrows: 10\n{\"passed\": true, \"confidence\": 0.9}\n";
        assert_eq!(
            last_json_object(output),
            Some(json!({"passed": true, "confidence": 0.9}))
        );
    }

    #[test]
    fn test_last_json_object_multiline() {
        let output = "{\n  \"passed\": true,\n  \"confidence\": 0.5\n}\n";
        assert_eq!(
            last_json_object(output),
            Some(json!({"passed": true, "confidence": 0.5}))
        );
    }

    #[test]
    fn test_last_json_object_none() {
        assert_eq!(last_json_object("Traceback: KeyError 'year'"), None);
        assert_eq!(last_json_object("} backwards {"), None);
    }
}
