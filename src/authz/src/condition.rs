//! Attribute conditions evaluated against request context

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Typed value carried by a condition or a request context entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ConditionValue {
    /// Build a string list value
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            ConditionValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_list(&self) -> Option<&[String]> {
        match self {
            ConditionValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::String(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<i64> for ConditionValue {
    fn from(value: i64) -> Self {
        ConditionValue::Number(value as f64)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Bool(value)
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(value: Vec<String>) -> Self {
        ConditionValue::List(value)
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    In,
    NotIn,
}

/// A single attribute check on the request context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Context key to look up
    pub field: String,

    pub operator: ConditionOperator,

    pub value: ConditionValue,
}

impl Condition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, ConditionOperator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self::new(field, ConditionOperator::Ne, value)
    }

    pub fn is_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field, ConditionOperator::In, ConditionValue::list(values))
    }

    pub fn not_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field, ConditionOperator::NotIn, ConditionValue::list(values))
    }

    /// Evaluate against the request context.
    ///
    /// A missing field never satisfies a condition, whatever the operator.
    pub fn is_satisfied(&self, context: &HashMap<String, ConditionValue>) -> bool {
        let Some(actual) = context.get(&self.field) else {
            return false;
        };

        match self.operator {
            ConditionOperator::Eq => *actual == self.value,
            ConditionOperator::Ne => *actual != self.value,
            ConditionOperator::In => match (actual.as_str(), self.value.as_list()) {
                (Some(s), Some(items)) => items.iter().any(|item| item == s),
                _ => false,
            },
            ConditionOperator::NotIn => match (actual.as_str(), self.value.as_list()) {
                (Some(s), Some(items)) => !items.iter().any(|item| item == s),
                _ => false,
            },
        }
    }
}
