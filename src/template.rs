//! Prompt template placeholder substitution (component C1).
//!
//! A template is plain text sprinkled with `{name}` placeholders, where
//! `name` matches `[A-Za-z_][A-Za-z0-9_]*`. Placeholders may repeat; order
//! of first appearance is preserved by [`required_vars`]. Rendering is a
//! pure function of the template and a context map: every placeholder
//! must resolve or rendering fails with the first missing name, in
//! left-to-right order.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utilities::errors::{MissingVariable, ValidationError};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid"));

/// Returns the placeholder names referenced by `template`, in order of
/// first appearance, without duplicates.
pub fn required_vars(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Substitutes every `{name}` placeholder in `template` with its value
/// from `context`. Fails on the first placeholder (left to right) that
/// has no entry in `context`.
pub fn render(template: &str, context: &HashMap<String, String>) -> Result<String, MissingVariable> {
    let mut out = String::with_capacity(template.len());
    let mut last_end = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let whole = caps.get(0).expect("group 0 always matches");
        let name = &caps[1];
        out.push_str(&template[last_end..whole.start()]);
        match context.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(MissingVariable(name.to_string())),
        }
        last_end = whole.end();
    }
    out.push_str(&template[last_end..]);
    Ok(out)
}

/// Validates that `template` has balanced, well-formed braces: every `{`
/// opens a placeholder matching the placeholder grammar and every `}`
/// closes one. Called once at task construction so malformed templates
/// are rejected before a crew ever runs, not mid-execution.
pub fn validate_template(task: &str, template: &str) -> Result<(), ValidationError> {
    let mut chars = template.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '{' => {
                let start = idx;
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(ValidationError::MalformedTemplate {
                        task: task.to_string(),
                        reason: format!("unterminated '{{' at byte offset {start}"),
                    });
                }
                let mut name_chars = name.chars();
                let valid = match name_chars.next() {
                    Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                        name_chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                    }
                    _ => false,
                };
                if !valid {
                    return Err(ValidationError::MalformedTemplate {
                        task: task.to_string(),
                        reason: format!("invalid placeholder name '{{{name}}}' at byte offset {start}"),
                    });
                }
            }
            '}' => {
                return Err(ValidationError::MalformedTemplate {
                    task: task.to_string(),
                    reason: format!("unmatched '}}' at byte offset {idx}"),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
