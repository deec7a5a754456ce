//! Declarative list definitions as they appear in configuration

use serde::{Deserialize, Serialize};

use crate::filter::{CompareOp, SortDirection};
use crate::model::Value;

/// One condition of a list: `field op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionSpec {
    /// Field (or id/shard column) name
    pub field: String,
    /// Comparison operator
    pub op: CompareOp,
    /// Literal compared against
    pub value: Value,
}

impl ConditionSpec {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// A named view over entries: conditions, optional sort and natural direction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDefinition {
    /// Conditions, all of which must hold
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,

    /// Name of a registered sort; `None` orders by identifier only
    #[serde(default)]
    pub sort: Option<String>,

    /// Natural direction of the list
    #[serde(default)]
    pub direction: SortDirection,
}

impl ListDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, condition: ConditionSpec) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn sorted_by(mut self, sort: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(sort.into());
        self.direction = direction;
        self
    }
}
