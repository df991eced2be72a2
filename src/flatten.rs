//! Turning one nested record into one flat row.
//!
//! Nested objects become dotted-path columns (`contact.address.city`). A few
//! known repeating sub-structures (breed names, photo URLs, options) arrive in
//! three shapes: absent, a single bare value, or a list. They are read into a
//! [`ZeroOrMore`] first and then spread into role-prefixed columns
//! (`breed0`, `photos0`, `photos1`, `status0`, ...). When a sub-structure is
//! absent its first column holds [`PLACEHOLDER`].

use serde_json::{Map, Value};

/// Cell value written when a known sub-structure is missing from a record.
pub const PLACEHOLDER: &str = "na";

/// Columns containing this marker carry no external meaning and are dropped.
pub const OPTIONS_MARKER: &str = "options";

/// Legacy documents wrap text in `{"$t": ...}` nodes.
const TEXT_NODE: &str = "$t";

/// Zero, one or many values, however the source encoded them.
///
/// # Examples
///
/// ```
/// use petfinder_client::ZeroOrMore;
/// use serde_json::json;
///
/// assert!(ZeroOrMore::from_json(None).is_empty());
/// assert_eq!(ZeroOrMore::from_json(Some(&json!("Pug"))).len(), 1);
/// assert_eq!(ZeroOrMore::from_json(Some(&json!(["Pug", "Beagle"]))).len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroOrMore<T>(Vec<T>);

impl<T> Default for ZeroOrMore<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> ZeroOrMore<T> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl ZeroOrMore<Value> {
    /// Reads any JSON shape: absent, `null` and `{}` are empty, an array
    /// yields its elements, anything else is a single value.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::default(),
            Some(Value::Array(items)) => Self(items.clone()),
            Some(Value::Object(map)) if map.is_empty() => Self::default(),
            Some(other) => Self(vec![other.clone()]),
        }
    }
}

impl<T> IntoIterator for ZeroOrMore<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A known repeating sub-structure of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubStructure {
    /// Path from the record root to the repeating node.
    pub path: &'static [&'static str],
    /// Key holding the value inside each item; `None` when items are bare values.
    pub item_key: Option<&'static str>,
    /// Column prefix for the spread values.
    pub prefix: &'static str,
}

impl SubStructure {
    /// Extracts the scalar for one item; bare values are taken as-is.
    fn extract(&self, item: &Value) -> Option<Value> {
        let value = match (self.item_key, item) {
            (Some(key), Value::Object(map)) => map.get(key)?,
            _ => item,
        };
        match value {
            Value::Null => None,
            other => Some(to_scalar(other)),
        }
    }
}

/// Per-resource flattening rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenRules {
    /// Sub-structures spread into role-prefixed columns.
    pub sub_structures: &'static [SubStructure],
    /// Column prefixes removed after flattening (`contact.` in legacy records).
    pub strip_prefixes: &'static [&'static str],
}

impl FlattenRules {
    /// No sub-structures, no prefix stripping.
    pub const PLAIN: FlattenRules = FlattenRules {
        sub_structures: &[],
        strip_prefixes: &[],
    };
}

/// One tabular row: column name to scalar value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    columns: Map<String, Value>,
}

impl FlatRecord {
    /// Returns the value of a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns the value of a column as a string slice.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Sets a column, overwriting any existing value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.shift_remove(column)
    }

    /// Keeps only the columns for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.columns.retain(|column, _| keep(column));
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consumes the row into its underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.columns
    }
}

/// Flattens records of one resource shape into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFlattener {
    rules: FlattenRules,
}

impl RecordFlattener {
    pub const fn new(rules: FlattenRules) -> Self {
        Self { rules }
    }

    /// Produces exactly one row for `record`.
    ///
    /// A record that is not a JSON object becomes a single `value` column, so
    /// nothing is ever dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use petfinder_client::flatten::{FlattenRules, RecordFlattener};
    /// use serde_json::json;
    ///
    /// let row = RecordFlattener::new(FlattenRules::PLAIN)
    ///     .flatten(&json!({"name": "Rex", "contact": {"address": {"city": "Seattle"}}}));
    ///
    /// assert_eq!(row.get_str("name"), Some("Rex"));
    /// assert_eq!(row.get_str("contact.address.city"), Some("Seattle"));
    /// ```
    pub fn flatten(&self, record: &Value) -> FlatRecord {
        let mut row = FlatRecord::default();

        match record {
            Value::Object(map) => {
                self.flatten_object(&mut row, &mut Vec::new(), map);
            }
            other => row.insert("value", to_scalar(other)),
        }

        for sub in self.rules.sub_structures {
            let node = lookup(record, sub.path);
            let values: Vec<Value> = ZeroOrMore::from_json(node)
                .iter()
                .filter_map(|item| sub.extract(item))
                .collect();

            if values.is_empty() {
                row.insert(format!("{}0", sub.prefix), PLACEHOLDER);
            } else {
                for (index, value) in values.into_iter().enumerate() {
                    row.insert(format!("{}{index}", sub.prefix), value);
                }
            }
        }

        if !self.rules.strip_prefixes.is_empty() {
            row = self.strip_prefixes(row);
        }

        row.retain(|column| !column.contains(OPTIONS_MARKER));
        row
    }

    fn flatten_object<'a>(
        &self,
        row: &mut FlatRecord,
        path: &mut Vec<&'a str>,
        map: &'a Map<String, Value>,
    ) {
        for (key, value) in map {
            if key != TEXT_NODE {
                path.push(key);
            }

            if self.is_sub_structure(path) {
                // spread separately
            } else if let Value::Object(child) = value {
                if !child.is_empty() {
                    self.flatten_object(row, path, child);
                }
            } else {
                let column = if path.is_empty() {
                    "name".to_string()
                } else {
                    path.join(".")
                };
                row.insert(column, to_scalar(value));
            }

            if key != TEXT_NODE {
                path.pop();
            }
        }
    }

    fn is_sub_structure(&self, path: &[&str]) -> bool {
        self.rules
            .sub_structures
            .iter()
            .any(|sub| sub.path == path)
    }

    fn strip_prefixes(&self, row: FlatRecord) -> FlatRecord {
        let mut stripped = FlatRecord::default();
        for (column, value) in row.into_map() {
            let column = self
                .rules
                .strip_prefixes
                .iter()
                .find_map(|prefix| column.strip_prefix(prefix))
                .map(str::to_string)
                .unwrap_or(column);
            stripped.insert(column, value);
        }
        stripped
    }
}

/// Follows `path` through nested objects.
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |node, key| node.get(*key))
}

/// Converts any JSON value into a cell.
///
/// Arrays of scalars are comma-joined; other composites are kept as JSON text;
/// legacy text nodes are unwrapped.
fn to_scalar(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Array(items) if items.iter().all(is_scalar) => Value::String(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(map) if map.len() == 1 && map.contains_key(TEXT_NODE) => {
            to_scalar(&map[TEXT_NODE])
        }
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LEGACY_PET: FlattenRules = FlattenRules {
        sub_structures: &[
            SubStructure {
                path: &["breeds", "breed"],
                item_key: Some("$t"),
                prefix: "breed",
            },
            SubStructure {
                path: &["media", "photos", "photo"],
                item_key: Some("$t"),
                prefix: "photos",
            },
            SubStructure {
                path: &["options", "option"],
                item_key: Some("$t"),
                prefix: "status",
            },
        ],
        strip_prefixes: &["contact."],
    };

    #[test]
    fn test_zero_or_more_shapes() {
        assert!(ZeroOrMore::from_json(Some(&json!(null))).is_empty());
        assert!(ZeroOrMore::from_json(Some(&json!({}))).is_empty());
        assert!(ZeroOrMore::from_json(Some(&json!([]))).is_empty());
        assert_eq!(
            ZeroOrMore::from_json(Some(&json!({"$t": "Pug"}))).into_vec(),
            vec![json!({"$t": "Pug"})]
        );
    }

    #[test]
    fn test_missing_sub_structures_get_placeholders() {
        let row = RecordFlattener::new(LEGACY_PET).flatten(&json!({
            "id": {"$t": "42"},
            "name": {"$t": "Rex"}
        }));

        assert_eq!(row.get_str("id"), Some("42"));
        assert_eq!(row.get_str("name"), Some("Rex"));
        assert_eq!(row.get_str("breed0"), Some(PLACEHOLDER));
        assert_eq!(row.get_str("photos0"), Some(PLACEHOLDER));
        assert_eq!(row.get_str("status0"), Some(PLACEHOLDER));
    }

    #[test]
    fn test_single_and_list_sub_structures_spread_into_columns() {
        let row = RecordFlattener::new(LEGACY_PET).flatten(&json!({
            "breeds": {"breed": {"$t": "Pug"}},
            "media": {"photos": {"photo": [
                {"@size": "x", "$t": "http://a/1.jpg"},
                {"@size": "pn", "$t": "http://a/2.jpg"}
            ]}},
            "options": {"option": [{"$t": "hasShots"}, {"$t": "altered"}]}
        }));

        assert_eq!(row.get_str("breed0"), Some("Pug"));
        assert_eq!(row.get("breed1"), None);
        assert_eq!(row.get_str("photos0"), Some("http://a/1.jpg"));
        assert_eq!(row.get_str("photos1"), Some("http://a/2.jpg"));
        assert_eq!(row.get_str("status0"), Some("hasShots"));
        assert_eq!(row.get_str("status1"), Some("altered"));
        assert!(row.columns().all(|c| !c.starts_with("breeds.") && !c.starts_with("media.")));
    }

    #[test]
    fn test_options_columns_are_dropped() {
        let row = RecordFlattener::new(FlattenRules::PLAIN).flatten(&json!({
            "name": "Rex",
            "options": {"spayed": true},
            "shelter_options": "x"
        }));

        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_contact_prefix_is_stripped() {
        let row = RecordFlattener::new(LEGACY_PET).flatten(&json!({
            "contact": {"email": {"$t": "a@b.org"}, "city": {"$t": "Seattle"}}
        }));

        assert_eq!(row.get_str("email"), Some("a@b.org"));
        assert_eq!(row.get_str("city"), Some("Seattle"));
        assert_eq!(row.get("contact.email"), None);
    }

    #[test]
    fn test_bare_text_node_becomes_name() {
        let row = RecordFlattener::new(FlattenRules::PLAIN).flatten(&json!({"$t": "Abyssinian"}));
        assert_eq!(row.get_str("name"), Some("Abyssinian"));
    }

    #[test]
    fn test_arrays_become_scalars() {
        let row = RecordFlattener::new(FlattenRules::PLAIN).flatten(&json!({
            "tags": ["Friendly", "Playful"],
            "videos": [{"embed": "<iframe/>"}],
            "empty": [],
            "hours": {}
        }));

        assert_eq!(row.get_str("tags"), Some("Friendly, Playful"));
        assert_eq!(row.get_str("videos"), Some(r#"[{"embed":"<iframe/>"}]"#));
        assert_eq!(row.get("empty"), Some(&Value::Null));
        assert_eq!(row.get("hours"), None);
    }
}
