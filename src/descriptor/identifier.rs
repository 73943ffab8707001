//! Canonical identifiers for generated task types.
//!
//! Tool names are free-form ("fsl-bet 6", "my_tool.v2"); the registry and the
//! generated definitions need a stable PascalCase type name instead.

use once_cell::sync::Lazy;
use regex::Regex;

/// Identifier used when nothing word-like survives derivation.
pub const UNNAMED_IDENTIFIER: &str = "UnnamedTool";

/// Prefix added when derivation would otherwise start with a digit.
const DIGIT_PREFIX: &str = "Tool";

static CANONICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("canonical identifier pattern"));

/// Derive the canonical type identifier for a tool name.
///
/// Steps, in order:
/// 1. `-` becomes `_`
/// 2. every character outside `[A-Za-z0-9_]` is removed
/// 3. one leading digit is removed
/// 4. each `_`-delimited segment gets its first letter capitalized and the
///    underscores are dropped (the rest of each segment is kept as is)
///
/// The function is total. Two degenerate cases are normalized so the result
/// always matches `[A-Z][A-Za-z0-9]*`: an empty result becomes
/// [`UNNAMED_IDENTIFIER`], and a result still starting with a digit (e.g.
/// from `"22x"`) is prefixed with `Tool`.
///
/// ```
/// use taskforge::descriptor::classify;
///
/// assert_eq!(classify("my-tool_name 2d"), "MyToolName2d");
/// assert_eq!(classify("2d_tool"), "DTool");
/// assert_eq!(classify(""), "UnnamedTool");
/// ```
pub fn classify(raw_name: &str) -> String {
    let underscored = raw_name.replace('-', "_");
    let word_chars: String = underscored
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let stripped = match word_chars.chars().next() {
        Some(c) if c.is_ascii_digit() => &word_chars[1..],
        _ => word_chars.as_str(),
    };

    let pascal: String = stripped.split('_').map(capitalize).collect();

    if pascal.is_empty() {
        UNNAMED_IDENTIFIER.to_string()
    } else if pascal.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, pascal)
    } else {
        pascal
    }
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Lower-case underscore form of an identifier (`MyToolName2d` →
/// `my_tool_name2d`), used for directory and file names.
///
/// Every upper-case letter after the first starts a new segment, so
/// `classify(&snake_case(id)) == id` for every canonical `id`.
pub fn snake_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 4);
    for (i, c) in identifier.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Whether a string is a well-formed canonical identifier.
pub fn is_canonical(identifier: &str) -> bool {
    CANONICAL_RE.is_match(identifier)
}
