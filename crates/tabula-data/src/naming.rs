//! Designer names -> Rust identifiers.
//!
//! Names are split on a designer-chosen separator; each segment keeps its
//! own casing except for the first letter, which is upper-cased. Type names
//! join the segments as is (`reward_table` -> `RewardTable`), field names
//! additionally lower-case the first letter (`reward_table` -> `rewardTable`).

use unicode_ident::{is_xid_continue, is_xid_start};

/// Rust keywords that cannot be used as plain identifiers.
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that are not allowed even as raw identifiers.
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Case conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    separator: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self::new("_")
    }
}

impl Naming {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    fn joined(&self, raw: &str) -> String {
        let segments: Vec<&str> = if self.separator.is_empty() {
            vec![raw]
        } else {
            raw.split(self.separator.as_str()).collect()
        };
        segments
            .into_iter()
            .map(sanitize)
            .filter(|s| !s.is_empty())
            .map(|s| upper_first(&s))
            .collect()
    }

    /// Type name for a table, e.g. `monster_drop` -> `MonsterDrop`.
    pub fn type_name(&self, raw: &str) -> String {
        escape(self.joined(raw))
    }

    /// Field name for a column or table, e.g. `max_hp` -> `maxHp`.
    pub fn field_name(&self, raw: &str) -> String {
        escape(lower_first(&self.joined(raw)))
    }
}

/// Replace characters that cannot appear in an identifier.
fn sanitize(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| if is_xid_continue(c) { c } else { '_' })
        .collect()
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Make `ident` a legal Rust identifier.
fn escape(ident: String) -> String {
    if ident.is_empty() {
        return "_unnamed".to_string();
    }
    if ident.starts_with(|c: char| c != '_' && !is_xid_start(c)) {
        return format!("_{ident}");
    }
    if RESERVED.contains(&ident.as_str()) {
        return format!("{ident}_");
    }
    if KEYWORDS.contains(&ident.as_str()) {
        return format!("r#{ident}");
    }
    ident
}

/// Flatten designer text for use inside a `//` or `///` comment.
pub fn comment_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
