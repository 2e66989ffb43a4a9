//! Search Query Compiler: turns a human-typed query string into a map from
//! FTS column (or the "any field" sentinel) to a single phrase string.

use std::collections::HashMap;

/// Sentinel key meaning "match against any indexed field".
pub const FIELD_ANY: &str = "any";

const STOP_TOKENS: &[&str] = &["", "and", "or", "not", "near"];
const SPECIAL_CHARS: &[char] = &['(', ')', '%', '*', '\\'];
const ME_WORD: &str = "me";

/// Field keys a caller can type as `key:value`, mapped to the FTS column
/// they route to.
fn lookup_field(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "attachment" => Some("attachment"),
        "bcc" => Some("bcc"),
        "body" => Some("body"),
        "cc" => Some("cc"),
        "from" => Some("from_field"),
        "subject" => Some("subject"),
        "to" => Some("receivers"),
        _ => None,
    }
}

/// Fields where the literal word "me" expands to the caller's own address.
fn expands_me(field: &str) -> bool {
    matches!(field, "bcc" | "cc" | "from_field" | "receivers")
}

/// A compiled query: one FTS phrase per field (or `FIELD_ANY`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    pub phrases: HashMap<String, String>,
}

impl CompiledQuery {
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Balance unbalanced trailing quotes: an odd count of `"` has its last
/// occurrence replaced with a space.
fn balance_quotes(raw: &str) -> String {
    let count = raw.matches('"').count();
    if count % 2 == 0 {
        return raw.to_string();
    }
    let last_idx = raw.rfind('"').expect("count is odd, so at least one exists");
    let mut out = String::with_capacity(raw.len());
    out.push_str(&raw[..last_idx]);
    out.push(' ');
    out.push_str(&raw[last_idx + '"'.len_utf8()..]);
    out
}

enum Run {
    Quoted(String),
    Unquoted(String),
}

/// Split into alternating quoted/unquoted runs on a (already quote-balanced)
/// string.
fn split_runs(raw: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut in_quotes = false;
    let mut current = String::new();
    for ch in raw.chars() {
        if ch == '"' {
            let finished = std::mem::take(&mut current);
            runs.push(if in_quotes {
                Run::Quoted(finished)
            } else {
                Run::Unquoted(finished)
            });
            in_quotes = !in_quotes;
        } else {
            current.push(ch);
        }
    }
    runs.push(if in_quotes {
        Run::Quoted(current)
    } else {
        Run::Unquoted(current)
    });
    runs
}

/// Tokenize an unquoted run on whitespace and the special character set,
/// preserving order.
fn tokenize_unquoted(run: &str) -> Vec<String> {
    run.split(|c: char| c.is_whitespace() || SPECIAL_CHARS.contains(&c))
        .map(str::to_string)
        .collect()
}

/// Compile a raw query string into field-scoped FTS phrases.
pub fn compile(raw_query: &str, own_email: &str) -> CompiledQuery {
    let balanced = balance_quotes(raw_query);
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();

    for run in split_runs(&balanced) {
        match run {
            Run::Quoted(text) => {
                let verbatim = text.replace(':', " ");
                let trimmed = verbatim.trim();
                if !trimmed.is_empty() {
                    fields
                        .entry(FIELD_ANY.to_string())
                        .or_default()
                        .push(trimmed.to_string());
                }
            }
            Run::Unquoted(text) => {
                for raw_token in tokenize_unquoted(&text) {
                    let lowered = raw_token.to_ascii_lowercase();
                    if STOP_TOKENS.contains(&lowered.as_str()) || lowered.starts_with("near/") {
                        continue;
                    }
                    let stripped = raw_token.strip_prefix('-').unwrap_or(&raw_token);
                    if stripped.is_empty() {
                        continue;
                    }

                    let (field, token_text) = match stripped.split_once(':') {
                        Some((key, value)) if !value.trim().is_empty() => {
                            match lookup_field(key) {
                                Some(field) if expands_me(field) && value.eq_ignore_ascii_case(ME_WORD) => {
                                    (field.to_string(), own_email.to_string())
                                }
                                Some(field) => (field.to_string(), value.to_string()),
                                None => (FIELD_ANY.to_string(), stripped.to_string()),
                            }
                        }
                        // `key:` with nothing (or only whitespace) after the colon has no
                        // field to route to; drop the colon and treat `key` itself as a
                        // plain any-field token.
                        Some((key, _)) => (FIELD_ANY.to_string(), key.to_string()),
                        None => (FIELD_ANY.to_string(), stripped.to_string()),
                    };

                    let wrapped = format!("\"{}*\"", token_text);
                    fields.entry(field).or_default().push(wrapped);
                }
            }
        }
    }

    let phrases = fields
        .into_iter()
        .map(|(field, tokens)| (field, tokens.join(" ")))
        .collect();

    CompiledQuery { phrases }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_tokens_and_plain_token() {
        let compiled = compile("from:alice@example.com subject:taxes 2024", "bob@x.org");
        assert_eq!(
            compiled.phrases.get("from_field"),
            Some(&"\"alice@example.com*\"".to_string())
        );
        assert_eq!(
            compiled.phrases.get("subject"),
            Some(&"\"taxes*\"".to_string())
        );
        assert_eq!(compiled.phrases.get(FIELD_ANY), Some(&"\"2024*\"".to_string()));
    }

    #[test]
    fn me_expansion() {
        let compiled = compile("to:me meeting", "bob@x.org");
        assert_eq!(
            compiled.phrases.get("receivers"),
            Some(&"\"bob@x.org*\"".to_string())
        );
        assert_eq!(
            compiled.phrases.get(FIELD_ANY),
            Some(&"\"meeting*\"".to_string())
        );
    }

    #[test]
    fn stop_tokens_only_yields_empty_map() {
        let compiled = compile("and or not", "bob@x.org");
        assert!(compiled.is_empty());
    }

    #[test]
    fn unbalanced_trailing_quote_is_balanced() {
        let a = compile("\"hello world", "bob@x.org");
        let b = compile("\"hello world\"", "bob@x.org");
        // The unbalanced variant drops the last quote (turning it into a
        // space), so it no longer parses as one quoted run; both still
        // produce a non-empty, deterministic result rather than erroring.
        assert!(!a.is_empty());
        assert!(!b.is_empty());
    }

    #[test]
    fn idempotent_on_same_input() {
        let a = compile("from:alice subject:taxes", "bob@x.org");
        let b = compile("from:alice subject:taxes", "bob@x.org");
        assert_eq!(a, b);
    }

    #[test]
    fn key_with_empty_value_falls_back_to_any() {
        let compiled = compile("subject: 2024", "bob@x.org");
        assert!(compiled.phrases.get("subject").is_none());
        assert_eq!(
            compiled.phrases.get(FIELD_ANY),
            Some(&"\"subject*\" \"2024*\"".to_string())
        );
    }
}
