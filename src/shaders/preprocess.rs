//! Textual preprocessing applied to WGSL before it reaches `naga`.
//!
//! Two directives are understood:
//!
//! - `#include "path"` on its own line is replaced by the expanded source
//!   registered under `path`
//! - `#inject NAME` anywhere in a line is replaced by the formatted value of
//!   `NAME` from a [`Definitions`] map

use std::collections::{BTreeMap, HashMap};

use log::warn;

/// Nesting limit for `#include`. Deeper chains are treated as cycles and cut.
pub const MAX_INCLUDE_DEPTH: usize = 32;

const INCLUDE: &str = "#include";
const INJECT: &str = "#inject";

/// Where `#include` looks up sources.
pub trait SourceProvider {
    fn source(&self, path: &str) -> Option<&str>;
}

impl SourceProvider for HashMap<String, String> {
    fn source(&self, path: &str) -> Option<&str> {
        self.get(path).map(String::as_str)
    }
}

impl SourceProvider for BTreeMap<String, String> {
    fn source(&self, path: &str) -> Option<&str> {
        self.get(path).map(String::as_str)
    }
}

/// A value substituted for `#inject NAME`.
#[derive(Clone, Debug, PartialEq)]
pub enum InjectValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Inserted verbatim, e.g. a comma separated list of literals.
    Raw(String),
}

impl From<i64> for InjectValue {
    fn from(value: i64) -> Self {
        InjectValue::Int(value)
    }
}

impl From<i32> for InjectValue {
    fn from(value: i32) -> Self {
        InjectValue::Int(value as i64)
    }
}

impl From<u32> for InjectValue {
    fn from(value: u32) -> Self {
        InjectValue::Int(value as i64)
    }
}

impl From<f64> for InjectValue {
    fn from(value: f64) -> Self {
        InjectValue::Float(value)
    }
}

impl From<f32> for InjectValue {
    fn from(value: f32) -> Self {
        InjectValue::Float(value as f64)
    }
}

impl From<bool> for InjectValue {
    fn from(value: bool) -> Self {
        InjectValue::Bool(value)
    }
}

impl From<&str> for InjectValue {
    fn from(value: &str) -> Self {
        InjectValue::Raw(value.to_string())
    }
}

impl From<String> for InjectValue {
    fn from(value: String) -> Self {
        InjectValue::Raw(value)
    }
}

impl InjectValue {
    pub fn to_wgsl(&self) -> String {
        match self {
            InjectValue::Int(v) => v.to_string(),
            InjectValue::Float(v) => format_float(*v),
            InjectValue::Bool(v) => v.to_string(),
            InjectValue::Raw(v) => v.clone(),
        }
    }
}

pub type Definitions = BTreeMap<String, InjectValue>;

/// Six decimals with trailing zeros trimmed. A decimal point is always kept
/// so the literal stays a float in WGSL.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        warn!("Non finite value {value} cannot be injected, using 0.0");
        return "0.0".to_string();
    }
    let mut text = format!("{value:.6}");
    while text.ends_with('0') && !text.ends_with(".0") {
        text.pop();
    }
    if text == "-0.0" {
        text.remove(0);
    }
    text
}

/// Recursively replaces `#include "path"` lines with the sources `provider` knows.
///
/// Missing includes are replaced by nothing and logged. Chains deeper than
/// [`MAX_INCLUDE_DEPTH`] are cut with a warning.
pub fn expand_includes(source: &str, provider: &dyn SourceProvider) -> String {
    expand(source, provider, 0)
}

fn expand(source: &str, provider: &dyn SourceProvider, depth: usize) -> String {
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        match include_path(line) {
            Some(path) if depth >= MAX_INCLUDE_DEPTH => {
                warn!("Include of `{path}` exceeds depth {MAX_INCLUDE_DEPTH}, probably a cycle");
            }
            Some(path) => match provider.source(path) {
                Some(text) => out.push_str(&expand(text, provider, depth + 1)),
                None => warn!("Shader include `{path}` not found"),
            },
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn include_path(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix(INCLUDE)?.trim();
    rest.strip_prefix('"')?.strip_suffix('"')
}

/// Replaces every `#inject NAME` with the value from `definitions`.
///
/// Unknown names are left in place and logged; the compiler then reports the line.
pub fn inject(source: &str, definitions: &Definitions) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(INJECT) {
        out.push_str(&rest[..start]);
        let after = &rest[start + INJECT.len()..];
        let name_start = after.len() - after.trim_start_matches([' ', '\t']).len();
        let name_len = after[name_start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len() - name_start);
        let name = &after[name_start..name_start + name_len];
        let consumed = start + INJECT.len() + name_start + name_len;

        match definitions.get(name) {
            Some(value) if !name.is_empty() => out.push_str(&value.to_wgsl()),
            _ => {
                warn!("No definition for `#inject {name}`");
                out.push_str(&rest[start..consumed]);
            }
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn floats_keep_a_decimal_point() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(0.38), "0.38");
        assert_eq!(format_float(-1.5), "-1.5");
        assert_eq!(format_float(1232.399963), "1232.399963");
        assert_eq!(format_float(-0.0), "0.0");
        assert_eq!(format_float(f64::NAN), "0.0");
    }

    #[test]
    fn includes_expand_recursively() {
        let lib = library(&[("a.wgsl", "#include \"b.wgsl\"\nfn a() {}"), ("b.wgsl", "fn b() {}")]);
        let out = expand_includes("#include \"a.wgsl\"\nfn main() {}", &lib);
        let lines: Vec<_> = out.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["fn b() {}", "fn a() {}", "fn main() {}"]);
    }

    #[test]
    fn missing_include_expands_to_nothing() {
        let out = expand_includes("  #include \"nope.wgsl\"\nfn main() {}", &library(&[]));
        assert_eq!(out.trim(), "fn main() {}");
    }

    #[test]
    fn include_cycles_terminate() {
        let lib = library(&[("a", "#include \"b\"\nA"), ("b", "#include \"a\"\nB")]);
        let out = expand_includes("#include \"a\"", &lib);
        assert_eq!(out.matches('A').count(), MAX_INCLUDE_DEPTH / 2);
    }

    #[test]
    fn inject_replaces_known_names() {
        let mut definitions = Definitions::new();
        definitions.insert("ROAD_WIDTH".into(), InjectValue::Float(2.0));
        definitions.insert("ITERATIONS".into(), InjectValue::Int(10));
        definitions.insert("KERNEL".into(), "0.5, 0.5".into());
        let out = inject(
            "const W: f32 = #inject ROAD_WIDTH;\nconst I: i32 = #inject ITERATIONS;\nconst K = array<f32, 2>(#inject KERNEL);",
            &definitions,
        );
        assert_eq!(
            out,
            "const W: f32 = 2.0;\nconst I: i32 = 10;\nconst K = array<f32, 2>(0.5, 0.5);"
        );
    }

    #[test]
    fn inject_leaves_unknown_names() {
        let out = inject("let x = #inject MISSING;", &Definitions::new());
        assert_eq!(out, "let x = #inject MISSING;");
    }
}
