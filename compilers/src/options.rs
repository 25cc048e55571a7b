//! Plugin options: ordered directive maps and the resolver that prepares them
//! for one compile call.
//!
//! A value may be given as a single item or as a sequence. Resolution wraps
//! `import` into a sequence and then runs the adapter's activation hook, so a
//! hook always sees the normalized shape.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

/// Option carrying the base name of the file being compiled.
pub const FILENAME: &str = "filename";
/// Inclusion directive for imported files.
pub const IMPORT: &str = "import";
/// Inclusion directive for compiler plugins.
pub const USE: &str = "use";

/// A single option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Any non-sequence JSON value (string, number, bool, object, null).
    Value(Value),
    /// Ordered sequence of values.
    Sequence(Vec<OptionValue>),
    /// An initialized helper-library plugin instance.
    Plugin(HelperPlugin),
}

impl OptionValue {
    pub fn is_sequence(&self) -> bool {
        matches!(self, OptionValue::Sequence(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Truthiness as configuration files use it: `false`, `null`, `0` and
    /// `""` are off, everything else is on.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Value(Value::Null) => false,
            OptionValue::Value(Value::Bool(b)) => *b,
            OptionValue::Value(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            OptionValue::Value(Value::String(s)) => !s.is_empty(),
            _ => true,
        }
    }

    /// Elements for an inclusion directive. A non-sequence counts as one.
    pub fn elements(&self) -> &[OptionValue] {
        match self {
            OptionValue::Sequence(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Key/value pairs for an assignment directive.
    ///
    /// Objects yield their entries in order, sequences yield index/value
    /// pairs, anything else yields nothing.
    pub fn entries(&self) -> Vec<(String, OptionValue)> {
        match self {
            OptionValue::Value(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), OptionValue::from(v.clone())))
                .collect(),
            OptionValue::Value(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), OptionValue::from(v.clone())))
                .collect(),
            OptionValue::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// JSON form handed to compiler hosts. Plugins become
    /// `{"$plugin": name, "options": ...}` markers.
    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Value(value) => value.clone(),
            OptionValue::Sequence(items) => {
                Value::Array(items.iter().map(OptionValue::to_json).collect())
            }
            OptionValue::Plugin(plugin) => plugin.to_json(),
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                OptionValue::Sequence(items.into_iter().map(OptionValue::from).collect())
            }
            other => OptionValue::Value(other),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Value(Value::String(value.to_string()))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Value(Value::String(value))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Value(Value::Bool(value))
    }
}

impl From<Vec<OptionValue>> for OptionValue {
    fn from(items: Vec<OptionValue>) -> Self {
        OptionValue::Sequence(items)
    }
}

impl From<HelperPlugin> for OptionValue {
    fn from(plugin: HelperPlugin) -> Self {
        OptionValue::Plugin(plugin)
    }
}

/// A helper library's plugin object, initialized and ready to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperPlugin {
    name: String,
    options: Option<Value>,
}

impl HelperPlugin {
    /// Stylus mixin library activated by `import: nib`.
    pub const NIB: &'static str = "nib";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn nib() -> Self {
        Self::new(Self::NIB)
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> Option<&Value> {
        self.options.as_ref()
    }

    pub fn to_json(&self) -> Value {
        let mut marker = Map::new();
        marker.insert("$plugin".to_string(), Value::String(self.name.clone()));
        marker.insert(
            "options".to_string(),
            self.options.clone().unwrap_or(Value::Null),
        );
        Value::Object(marker)
    }
}

/// Ordered map from directive name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginOptions {
    entries: IndexMap<String, OptionValue>,
}

impl PluginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build options from a JSON object; any other JSON value yields nothing.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut OptionValue> {
        self.entries.get_mut(key)
    }

    /// Insert or overwrite. Overwriting keeps the key's original position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shallow merge: entries in `overrides` replace entries here.
    pub fn merge(&mut self, overrides: &PluginOptions) {
        for (key, value) in overrides.iter() {
            self.entries.insert(key.to_string(), value.clone());
        }
    }

    /// Make `key` a sequence (creating it or wrapping a scalar) and return it.
    pub fn ensure_sequence(&mut self, key: &str) -> &mut Vec<OptionValue> {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| OptionValue::Sequence(Vec::new()));
        if !slot.is_sequence() {
            let scalar = std::mem::replace(slot, OptionValue::Sequence(Vec::new()));
            *slot = OptionValue::Sequence(vec![scalar]);
        }
        match slot {
            OptionValue::Sequence(items) => items,
            _ => unreachable!("slot was just normalized to a sequence"),
        }
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for PluginOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Named configuration directives understood by directive-driven compilers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Set,
    Define,
    Include,
    Import,
    Use,
}

/// How a directive's value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveClass {
    /// One key/value call per pair.
    Assignment,
    /// One single-argument call per element.
    Inclusion,
}

impl Directive {
    /// Classify an option name. Unknown names are not directives.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "set" => Some(Directive::Set),
            "define" => Some(Directive::Define),
            "include" => Some(Directive::Include),
            "import" => Some(Directive::Import),
            "use" => Some(Directive::Use),
            _ => None,
        }
    }

    pub fn class(self) -> DirectiveClass {
        match self {
            Directive::Set | Directive::Define => DirectiveClass::Assignment,
            Directive::Include | Directive::Import | Directive::Use => DirectiveClass::Inclusion,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Directive::Set => "set",
            Directive::Define => "define",
            Directive::Include => "include",
            Directive::Import => "import",
            Directive::Use => "use",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve instance defaults into the options for one compile call.
///
/// `activate` runs last, on the normalized map, and may add directives
/// implied by others. The defaults are never modified.
pub fn resolve_options<F>(defaults: &PluginOptions, file_path: &Path, activate: F) -> PluginOptions
where
    F: FnOnce(&mut PluginOptions),
{
    let mut options = defaults.clone();
    options.insert(FILENAME, base_name(file_path));

    if let Some(import) = options.get_mut(IMPORT) {
        let absent = matches!(import, OptionValue::Value(Value::Null));
        if !absent && !import.is_sequence() {
            let scalar = std::mem::replace(import, OptionValue::Sequence(Vec::new()));
            *import = OptionValue::Sequence(vec![scalar]);
        }
    }

    activate(&mut options);
    options
}

/// Base name of `file_path`; compilers only need the file's own name.
pub fn base_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
