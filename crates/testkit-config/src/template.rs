//! Substitution of non-JSON fragments embedded in gateway configs.
//!
//! Gateway configs are templates: they carry `{{ var }}` expressions,
//! `{% ... %}` tags and backtick-delimited inline function bodies, none of
//! which are JSON. Each fragment is replaced by a neutral value so the
//! remainder can be parsed structurally:
//!
//! - `` `...` `` becomes the string `"syncfunction"`
//! - `{{ ... }}` becomes `null` in value position, nothing in member
//!   position, and the empty string inside a JSON string
//! - `{% ... %}` is removed

use crate::error::ConfigError;

/// Placeholder string that stands in for inline function bodies.
pub(crate) const FUNCTION_PLACEHOLDER: &str = "\"syncfunction\"";

/// Replace every template fragment in `input` with a neutral JSON value.
pub fn neutralize_placeholders(input: &str) -> Result<String, ConfigError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());

    let mut containers: Vec<char> = Vec::new();
    let mut last_significant: Option<char> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                i += 1;
                continue;
            }
            if let Some(end) = template_tag_end(&chars, i)? {
                i = end;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => {
                    in_string = false;
                    last_significant = Some('"');
                }
                _ => {}
            }
            out.push(c);
            i += 1;
            continue;
        }

        if c == '`' {
            let close = find_char(&chars, i + 1, '`').ok_or(ConfigError::Unterminated("inline function"))?;
            out.push_str(FUNCTION_PLACEHOLDER);
            last_significant = Some('"');
            i = close + 1;
            continue;
        }

        if starts_with(&chars, i, "{{") {
            let end = find_str(&chars, i + 2, "}}").ok_or(ConfigError::Unterminated("'{{' expression"))?;
            let in_array = containers.last() == Some(&'[');
            let value_position = match last_significant {
                Some(':') => true,
                Some('[') | Some(',') => in_array,
                _ => false,
            };
            if value_position {
                out.push_str("null");
                last_significant = Some('l');
            }
            i = end + 2;
            continue;
        }

        if starts_with(&chars, i, "{%") {
            let end = find_str(&chars, i + 2, "%}").ok_or(ConfigError::Unterminated("'{%' tag"))?;
            i = end + 2;
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => containers.push(c),
            '}' | ']' => {
                containers.pop();
            }
            _ => {}
        }
        if !c.is_whitespace() && c != '"' {
            last_significant = Some(c);
        }
        out.push(c);
        i += 1;
    }

    Ok(out)
}

/// If a template tag starts at `i` inside a string, return the index just past it.
fn template_tag_end(chars: &[char], i: usize) -> Result<Option<usize>, ConfigError> {
    if starts_with(chars, i, "{{") {
        let end = find_str(chars, i + 2, "}}").ok_or(ConfigError::Unterminated("'{{' expression"))?;
        return Ok(Some(end + 2));
    }
    if starts_with(chars, i, "{%") {
        let end = find_str(chars, i + 2, "%}").ok_or(ConfigError::Unterminated("'{%' tag"))?;
        return Ok(Some(end + 2));
    }
    Ok(None)
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut idx = at;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

fn find_str(chars: &[char], from: usize, pattern: &str) -> Option<usize> {
    (from..chars.len()).find(|&idx| starts_with(chars, idx, pattern))
}

fn find_char(chars: &[char], from: usize, target: char) -> Option<usize> {
    (from..chars.len()).find(|&idx| chars[idx] == target)
}
