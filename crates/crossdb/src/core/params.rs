//! Named bind parameters.
//!
//! Statements use the `:name` placeholder convention on every dialect.
//! [`BindParams`] keeps the values in insertion order; names are stored
//! without the leading colon and looked up case-insensitively.

use std::collections::BTreeSet;

use super::value::SqlValue;

/// Insertion-ordered set of named bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindParams {
    entries: Vec<(String, SqlValue)>,
}

fn normalize(name: &str) -> &str {
    name.strip_prefix(':').unwrap_or(name)
}

impl BindParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a value, replacing an existing binding of the same name.
    pub fn set(&mut self, name: &str, value: impl Into<SqlValue>) {
        let name = normalize(name);
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let name = normalize(name);
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<SqlValue> {
        let name = normalize(name);
        let pos = self
            .entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    /// Keep only the entries for which `keep(name, value)` holds.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &SqlValue) -> bool,
    {
        self.entries.retain(|(n, v)| keep(n, v));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut SqlValue)> {
        self.entries.iter_mut().map(|(n, v)| (n.as_str(), v))
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Append all bindings of `other`, replacing duplicates.
    pub fn extend(&mut self, other: BindParams) {
        for (name, value) in other.entries {
            self.set(&name, value);
        }
    }
}

impl<S: AsRef<str>, V: Into<SqlValue>> FromIterator<(S, V)> for BindParams {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut params = BindParams::new();
        for (name, value) in iter {
            params.set(name.as_ref(), value);
        }
        params
    }
}

impl IntoIterator for BindParams {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Expand a list of values into numbered placeholders for an `IN (...)`
/// clause, appending the values to `params`.
///
/// ```
/// use crossdb::core::params::{bind_param_array, BindParams};
/// let mut params = BindParams::new();
/// let list = bind_param_array("x", vec!["a", "b", "c"], &mut params);
/// assert_eq!(list, ":x0,:x1,:x2");
/// assert_eq!(params.len(), 3);
/// ```
pub fn bind_param_array<I, V>(prefix: &str, values: I, params: &mut BindParams) -> String
where
    I: IntoIterator<Item = V>,
    V: Into<SqlValue>,
{
    let mut placeholders = Vec::new();
    for (i, value) in values.into_iter().enumerate() {
        let name = format!("{}{}", prefix, i);
        placeholders.push(format!(":{}", name));
        params.set(&name, value);
    }
    placeholders.join(",")
}

/// Collect the `:name` placeholders referenced by a statement.
///
/// String literals, quoted identifiers and comments are skipped, as are
/// `::` casts and the PL/SQL `:=` operator. `backslash_escapes` selects
/// MySQL string syntax, where `\'` does not end a literal.
pub fn placeholder_names(sql: &str, backslash_escapes: bool) -> BTreeSet<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut names = BTreeSet::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"' | '`') => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == quote {
                        // doubled quote is an escaped quote
                        if chars.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    if backslash_escapes && chars[i] == '\\' && quote == '\'' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ':' => {
                let prev_colon = i > 0 && chars[i - 1] == ':';
                let next = chars.get(i + 1).copied();
                if !prev_colon && next.is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len()
                        && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                    {
                        end += 1;
                    }
                    names.insert(chars[start..end].iter().collect());
                    i = end;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    names
}

/// Drop the bindings the statement never references.
///
/// Both drivers reject binds without a matching placeholder, while
/// callers routinely pass a superset (e.g. a whole row for a partial
/// UPDATE).
pub fn prune_unused(sql: &str, params: &mut BindParams, backslash_escapes: bool) {
    let used: Vec<String> = placeholder_names(sql, backslash_escapes)
        .into_iter()
        .map(|n| n.to_uppercase())
        .collect();
    params.retain(|name, _| used.iter().any(|u| u == &name.to_uppercase()));
}

/// True for parameter names that select the LOB binding path.
pub fn is_lob_name(name: &str) -> bool {
    let lower = normalize(name).to_ascii_lowercase();
    lower.starts_with("clob_") || lower.starts_with("blob_") || lower.starts_with("lob_")
}
