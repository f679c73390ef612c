//! Declarative matching conditions evaluated against work items.

use crate::task::domain::Task;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Work-item attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    /// The work-item kind label.
    Kind,
    /// Any of the work-item tags.
    Tag,
    /// The customer reference.
    Customer,
    /// The numeric claim priority.
    Priority,
    /// The work-item title.
    Title,
}

/// Comparison applied between the selected field and the condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Field equals the value.
    Equals,
    /// Field differs from the value.
    NotEquals,
    /// Field contains the value as a substring, or the tag list contains it.
    Contains,
    /// Field equals one of the values in a JSON array.
    In,
    /// Numeric field is strictly less than the value.
    LessThan,
    /// Numeric field is strictly greater than the value.
    GreaterThan,
}

/// A single field/operator/value predicate.
///
/// Conditions never fail: an operator applied to an incompatible field or
/// value simply does not match. An absent optional field matches nothing
/// except `NotEquals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    field: ConditionField,
    operator: ConditionOperator,
    value: Value,
}

impl Condition {
    /// Creates a condition from its parts.
    #[must_use]
    pub const fn new(field: ConditionField, operator: ConditionOperator, value: Value) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    /// Returns the inspected field.
    #[must_use]
    pub const fn field(&self) -> ConditionField {
        self.field
    }

    /// Returns the comparison operator.
    #[must_use]
    pub const fn operator(&self) -> ConditionOperator {
        self.operator
    }

    /// Returns the comparison value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluates the condition against a work item.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self.field {
            ConditionField::Kind => self.matches_text(task.kind()),
            ConditionField::Customer => self.matches_text(task.customer()),
            ConditionField::Title => self.matches_text(Some(task.title())),
            ConditionField::Tag => self.matches_tags(task.tags()),
            ConditionField::Priority => self.matches_number(task.priority()),
        }
    }

    fn matches_text(&self, actual: Option<&str>) -> bool {
        match self.operator {
            ConditionOperator::Equals => match (actual, self.value.as_str()) {
                (Some(actual_text), Some(expected)) => actual_text == expected,
                _ => false,
            },
            ConditionOperator::NotEquals => match (actual, self.value.as_str()) {
                (Some(actual_text), Some(expected)) => actual_text != expected,
                (None, Some(_)) => true,
                _ => false,
            },
            ConditionOperator::Contains => match (actual, self.value.as_str()) {
                (Some(actual_text), Some(needle)) => actual_text.contains(needle),
                _ => false,
            },
            ConditionOperator::In => match (actual, self.value.as_array()) {
                (Some(actual_text), Some(options)) => options
                    .iter()
                    .any(|option| option.as_str() == Some(actual_text)),
                _ => false,
            },
            ConditionOperator::LessThan | ConditionOperator::GreaterThan => false,
        }
    }

    fn matches_tags(&self, tags: &[String]) -> bool {
        match self.operator {
            ConditionOperator::Equals | ConditionOperator::Contains => self
                .value
                .as_str()
                .is_some_and(|expected| tags.iter().any(|tag| tag == expected)),
            ConditionOperator::NotEquals => self
                .value
                .as_str()
                .is_some_and(|expected| tags.iter().all(|tag| tag != expected)),
            ConditionOperator::In => self.value.as_array().is_some_and(|options| {
                tags.iter()
                    .any(|tag| options.iter().any(|option| option.as_str() == Some(tag)))
            }),
            ConditionOperator::LessThan | ConditionOperator::GreaterThan => false,
        }
    }

    fn matches_number(&self, actual: i32) -> bool {
        let candidate = i64::from(actual);
        if let ConditionOperator::In = self.operator {
            return self.value.as_array().is_some_and(|options| {
                options
                    .iter()
                    .any(|option| option.as_i64() == Some(candidate))
            });
        }
        let Some(expected) = self.value.as_i64() else {
            return matches!(self.operator, ConditionOperator::NotEquals);
        };
        match self.operator {
            ConditionOperator::Equals => candidate == expected,
            ConditionOperator::NotEquals => candidate != expected,
            ConditionOperator::LessThan => candidate < expected,
            ConditionOperator::GreaterThan => candidate > expected,
            ConditionOperator::Contains | ConditionOperator::In => false,
        }
    }
}
