//! Scene metadata parsing
//!
//! Landsat MTL files (and the flat key/value metadata GDAL exposes for other
//! products) are line oriented:
//!
//! ```text
//! GROUP = L1_METADATA_FILE
//!   GROUP = IMAGE_ATTRIBUTES
//!     SUN_ELEVATION = 36.93
//!   END_GROUP = IMAGE_ATTRIBUTES
//! END_GROUP = L1_METADATA_FILE
//! END
//! ```
//!
//! The parser builds an owned [`MetadataGroup`] tree with a stack of open
//! groups. A group is attached to its parent only when it closes, so there is
//! never more than one mutable handle into the tree.

use crate::errors::{Result, SatGridError};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::{Path, PathBuf};

/// A leaf value, typed from its literal syntax
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Number(f64),
    Bool(bool),
    Null,
    /// A quoted string literal, stored without quotes
    Text(String),
    /// Anything that is not a valid literal (dates, times, bare words)
    Raw(String),
}

impl MetadataValue {
    /// Coerce a raw value the way a JSON literal would be read, falling back to the raw text.
    pub fn coerce(raw: &str) -> Self {
        match serde_json::from_str::<JsonValue>(raw) {
            Ok(JsonValue::Number(n)) => match n.as_f64() {
                Some(v) => MetadataValue::Number(v),
                None => MetadataValue::Raw(raw.to_string()),
            },
            Ok(JsonValue::Bool(b)) => MetadataValue::Bool(b),
            Ok(JsonValue::Null) => MetadataValue::Null,
            Ok(JsonValue::String(s)) => MetadataValue::Text(s),
            Ok(_) | Err(_) => MetadataValue::Raw(raw.to_string()),
        }
    }

    /// Numeric view of the value. Strings holding a number are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(v) => Some(*v),
            MetadataValue::Text(s) | MetadataValue::Raw(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) | MetadataValue::Raw(s) => Some(s),
            _ => None,
        }
    }

    fn to_literal(&self) -> String {
        match self {
            MetadataValue::Number(v) => v.to_string(),
            MetadataValue::Bool(b) => b.to_string(),
            MetadataValue::Null => "null".to_string(),
            MetadataValue::Text(s) => JsonValue::String(s.clone()).to_string(),
            MetadataValue::Raw(s) => s.clone(),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            MetadataValue::Number(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            MetadataValue::Bool(b) => JsonValue::Bool(*b),
            MetadataValue::Null => JsonValue::Null,
            MetadataValue::Text(s) | MetadataValue::Raw(s) => JsonValue::String(s.clone()),
        }
    }
}

/// One level of the metadata tree. Entry and child order follow the source text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataGroup {
    pub name: String,
    pub entries: Vec<(String, MetadataValue)>,
    pub groups: Vec<MetadataGroup>,
}

impl MetadataGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn value(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn group(&self, name: &str) -> Option<&MetadataGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Later assignments of the same key replace the earlier value in place.
    fn set(&mut self, key: String, value: MetadataValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// A reopened group replaces the previous one of the same name.
    fn attach(&mut self, child: MetadataGroup) {
        match self.groups.iter_mut().find(|g| g.name == child.name) {
            Some(slot) => *slot = child,
            None => self.groups.push(child),
        }
    }

    fn write_mtl(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        for (key, value) in &self.entries {
            out.push_str(&format!("{indent}{key} = {}\n", value.to_literal()));
        }
        for group in &self.groups {
            out.push_str(&format!("{indent}GROUP = {}\n", group.name));
            group.write_mtl(out, depth + 1);
            out.push_str(&format!("{indent}END_GROUP = {}\n", group.name));
        }
    }

    fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json());
        }
        for group in &self.groups {
            map.insert(group.name.clone(), group.to_json());
        }
        JsonValue::Object(map)
    }
}

/// Parsed metadata of one scene, read-only once built
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneMetadata {
    root: MetadataGroup,
}

impl SceneMetadata {
    /// Flat metadata from `KEY=VALUE` items, e.g. a GDAL default metadata domain
    pub fn from_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut root = MetadataGroup::default();
        for (key, value) in items {
            root.set(key.into(), MetadataValue::coerce(value.as_ref().trim()));
        }
        Self { root }
    }

    /// Name of the unwrapped outermost group, empty for flat metadata
    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    pub fn root(&self) -> &MetadataGroup {
        &self.root
    }

    /// Resolve a value by its group path, the last element being the key.
    pub fn get(&self, path: &[&str]) -> Option<&MetadataValue> {
        let (key, groups) = path.split_last()?;
        let mut group = &self.root;
        for name in groups {
            group = group.group(name)?;
        }
        group.value(key)
    }

    pub fn group(&self, path: &[&str]) -> Option<&MetadataGroup> {
        let mut group = &self.root;
        for name in path {
            group = group.group(name)?;
        }
        Some(group)
    }

    /// Numeric value at `path`. Absent or non-numeric keys fail for `band`.
    pub fn require_f64(&self, path: &[&str], band: &str) -> Result<f64> {
        self.get(path)
            .and_then(MetadataValue::as_f64)
            .ok_or_else(|| SatGridError::MissingKey {
                band: band.to_string(),
                path: path.join("."),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.root.entries.is_empty() && self.root.groups.is_empty()
    }

    /// Serialize back to the GROUP / END_GROUP / KEY = VALUE grammar.
    pub fn to_mtl_string(&self) -> String {
        let mut out = String::new();
        if self.root.name.is_empty() {
            self.root.write_mtl(&mut out, 0);
        } else {
            out.push_str(&format!("GROUP = {}\n", self.root.name));
            self.root.write_mtl(&mut out, 1);
            out.push_str(&format!("END_GROUP = {}\n", self.root.name));
        }
        out.push_str("END\n");
        out
    }

    pub fn to_json(&self) -> JsonValue {
        self.root.to_json()
    }
}

/// Parse MTL-style metadata text.
///
/// Parsing stops at the first `END` line. Blank lines are skipped. Any other
/// line that is not `GROUP = <name>`, `END_GROUP [= <name>]` or
/// `KEY = VALUE` is a [`SatGridError::Parse`].
pub fn parse(text: &str) -> Result<SceneMetadata> {
    let mut stack = vec![MetadataGroup::default()];

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        let parse_err = |message: String| SatGridError::Parse {
            line: line_no,
            message,
        };

        if line.is_empty() {
            continue;
        }
        if line == "END" {
            break;
        }
        if line == "END_GROUP" {
            close_group(&mut stack, None).map_err(parse_err)?;
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .map(|(k, v)| (k.trim(), v.trim()))
            .ok_or_else(|| parse_err(format!("expected KEY = VALUE, found '{line}'")))?;

        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(parse_err(format!("invalid key '{key}'")));
        }
        if value.is_empty() {
            return Err(parse_err(format!("key '{key}' has no value")));
        }

        match key {
            "GROUP" => stack.push(MetadataGroup::new(value)),
            "END_GROUP" => close_group(&mut stack, Some(value)).map_err(parse_err)?,
            _ => {
                let current = stack
                    .last_mut()
                    .ok_or_else(|| parse_err("group stack is empty".to_string()))?;
                current.set(key.to_string(), MetadataValue::coerce(value));
            }
        }
    }

    if stack.len() > 1 {
        let open: Vec<&str> = stack[1..].iter().map(|g| g.name.as_str()).collect();
        return Err(SatGridError::Parse {
            line: text.lines().count(),
            message: format!("unterminated group(s): {}", open.join(", ")),
        });
    }

    let mut root = stack.pop().unwrap_or_default();
    if root.entries.is_empty() && root.groups.len() == 1 {
        root = root.groups.remove(0);
    }

    Ok(SceneMetadata { root })
}

fn close_group(
    stack: &mut Vec<MetadataGroup>,
    name: Option<&str>,
) -> std::result::Result<(), String> {
    if stack.len() < 2 {
        return Err("END_GROUP without a matching GROUP".to_string());
    }
    let child = stack.pop().ok_or("group stack is empty")?;
    if let Some(name) = name {
        if name != child.name {
            return Err(format!(
                "END_GROUP = {name} closes group '{}'",
                child.name
            ));
        }
    }
    if let Some(parent) = stack.last_mut() {
        parent.attach(child);
    }
    Ok(())
}

/// Find the single metadata file in `dir` whose name starts with `prefix` and
/// ends with `suffix`. The lexicographically first match wins.
pub fn find_metadata_file(dir: &Path, prefix: &str, suffix: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(prefix) && n.ends_with(suffix))
                    .unwrap_or(false)
        })
        .collect();
    matches.sort();

    matches
        .into_iter()
        .next()
        .ok_or_else(|| SatGridError::MetadataFileNotFound {
            dir: dir.to_path_buf(),
            pattern: format!("{prefix}*{suffix}"),
        })
}

/// Locate and parse the MTL file of a tile directory.
pub fn read_scene_metadata(tile_path: &Path, prefix: &str, suffix: &str) -> Result<SceneMetadata> {
    let path = find_metadata_file(tile_path, prefix, suffix)?;
    tracing::debug!(file = %path.display(), "parsing scene metadata");
    let text = fs::read_to_string(&path)?;
    parse(&text)
}
