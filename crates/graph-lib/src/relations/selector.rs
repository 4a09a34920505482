//! Label selectors
//!
//! Controllers and services declare either a plain map of required label
//! values or the set-based form with `matchLabels` and `matchExpressions`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "In" => Some(Self::In),
            "NotIn" => Some(Self::NotIn),
            "Exists" => Some(Self::Exists),
            "DoesNotExist" => Some(Self::DoesNotExist),
            _ => None,
        }
    }
}

/// One `matchExpressions` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: Vec<String>,
}

impl Requirement {
    fn matches(&self, labels: &Map<String, Value>) -> bool {
        let value = labels.get(&self.key).and_then(Value::as_str);
        match self.operator {
            Operator::In => value.is_some_and(|v| self.values.iter().any(|want| want == v)),
            Operator::NotIn => value.map_or(true, |v| self.values.iter().all(|want| want != v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

/// A conjunction of label requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    pub match_labels: BTreeMap<String, String>,
    pub match_expressions: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector object. Returns `None` for anything that is not a
    /// well-formed selector, including unknown operators.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        if !object.contains_key("matchLabels") && !object.contains_key("matchExpressions") {
            return Some(Self {
                match_labels: string_map(object)?,
                match_expressions: Vec::new(),
            });
        }

        let match_labels = match object.get("matchLabels") {
            Some(Value::Object(labels)) => string_map(labels)?,
            Some(Value::Null) | None => BTreeMap::new(),
            Some(_) => return None,
        };

        let match_expressions = match object.get("matchExpressions") {
            Some(Value::Array(expressions)) => expressions
                .iter()
                .map(requirement)
                .collect::<Option<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return None,
        };

        Some(Self {
            match_labels,
            match_expressions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// An empty selector selects nothing
    pub fn matches(&self, labels: Option<&Map<String, Value>>) -> bool {
        if self.is_empty() {
            return false;
        }
        let empty = Map::new();
        let labels = labels.unwrap_or(&empty);

        self.match_labels
            .iter()
            .all(|(key, want)| labels.get(key).and_then(Value::as_str) == Some(want.as_str()))
            && self.match_expressions.iter().all(|req| req.matches(labels))
    }
}

fn string_map(object: &Map<String, Value>) -> Option<BTreeMap<String, String>> {
    object
        .iter()
        .map(|(key, value)| Some((key.clone(), value.as_str()?.to_string())))
        .collect()
}

fn requirement(value: &Value) -> Option<Requirement> {
    let key = value.get("key")?.as_str()?.to_string();
    let operator = Operator::parse(value.get("operator")?.as_str()?)?;
    let values = match value.get("values") {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        _ => Vec::new(),
    };

    // In and NotIn need at least one value; Exists and DoesNotExist take none
    let needs_values = matches!(operator, Operator::In | Operator::NotIn);
    if needs_values == values.is_empty() {
        return None;
    }

    Some(Requirement {
        key,
        operator,
        values,
    })
}
