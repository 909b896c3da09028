// src/completion/sanitize.rs
//! Cleanup for model output before it is parsed or shown.
//!
//! Models wrap answers in code fences, prepend chatty preambles, or emit
//! `<think>` reasoning blocks. Each rule here is a small testable step;
//! `clean_completion` composes the ones every generative call needs.

/// Remove `<think>...</think>` reasoning blocks. An unterminated block is
/// dropped to the end of the text.
pub fn strip_reasoning(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => return out.trim().to_string(),
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Strip a leading ```lang fence line and a trailing ``` fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(newline) => &body[newline + 1..],
            None => "",
        };
    }
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped;
    }
    body.trim()
}

/// Slice out the first balanced `{...}` object, skipping braces inside JSON
/// strings. Returns `None` when no object closes.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Standard cleanup applied to every completion: drop reasoning blocks,
/// then unwrap code fences.
pub fn clean_completion(text: &str) -> String {
    let without_reasoning = strip_reasoning(text);
    strip_code_fences(&without_reasoning).to_string()
}

/// Drop a label a model echoes back before the requested text, either a
/// same-line `Script:` prefix or a `Here is ...:` line of its own.
pub fn strip_preamble(text: &str) -> &str {
    let body = text.trim_start();
    if let Some(head) = body.get(.."script:".len()) {
        if head.eq_ignore_ascii_case("script:") {
            return body["script:".len()..].trim_start();
        }
    }
    if let Some((first, rest)) = body.split_once('\n') {
        let first = first.trim().to_lowercase();
        if first.ends_with(':') && (first.starts_with("here is") || first.starts_with("here's")) {
            return rest.trim_start();
        }
    }
    body
}

/// Cleanup for free-text output such as generated scripts: reasoning blocks,
/// fences, then echoed labels.
pub fn clean_script_text(text: &str) -> String {
    let without_reasoning = strip_reasoning(text);
    strip_preamble(strip_code_fences(&without_reasoning)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let raw = "```json\n{\"intent\": \"trending\"}\n```";
        assert_eq!(clean_completion(raw), "{\"intent\": \"trending\"}");
    }

    #[test]
    fn strips_bare_fences_and_reasoning() {
        let raw = "<think>planning the answer</think>\n```\nhello world\n```";
        assert_eq!(clean_completion(raw), "hello world");
    }

    #[test]
    fn unterminated_reasoning_drops_to_end() {
        assert_eq!(strip_reasoning("before <think>never closed"), "before");
    }

    #[test]
    fn extracts_object_from_preamble_and_postamble() {
        let raw = "Here is the JSON you asked for: {\"a\": {\"b\": 1}} hope it helps";
        assert_eq!(extract_json_object(raw), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_object() {
        let raw = r#"{"text": "left { and \" right }", "n": 2} trailing"#;
        assert_eq!(
            extract_json_object(raw),
            Some(r#"{"text": "left { and \" right }", "n": 2}"#)
        );
    }

    #[test]
    fn no_object_yields_none() {
        assert_eq!(extract_json_object("plain prose"), None);
        assert_eq!(extract_json_object("{never closed"), None);
    }

    #[test]
    fn passthrough_when_already_clean() {
        assert_eq!(clean_completion("  plain summary text  "), "plain summary text");
    }

    #[test]
    fn strips_echoed_script_label() {
        assert_eq!(strip_preamble("Script: Hello there."), "Hello there.");
        assert_eq!(strip_preamble("SCRIPT:\nHello there."), "Hello there.");
        assert_eq!(
            strip_preamble("Here is the script:\nHello there."),
            "Hello there."
        );
    }

    #[test]
    fn keeps_text_without_label() {
        assert_eq!(strip_preamble("Hello there."), "Hello there.");
        // "Here is" mid-text must survive.
        assert_eq!(
            strip_preamble("The summary. Here is more:\ndetail"),
            "The summary. Here is more:\ndetail"
        );
    }

    #[test]
    fn script_cleanup_composes_all_steps() {
        let raw = "<think>outlining</think>\n```\nScript: Welcome back, everyone.\n```";
        assert_eq!(clean_script_text(raw), "Welcome back, everyone.");
    }
}
