//! Dependency rules controlling field visibility.
//!
//! A field declares zero or more rules; each rule is a conjunction of
//! conditions over other fields' current values, and the field is
//! active when any rule holds. Fields without rules are always active.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

/// Condition a controlling field's value must satisfy.
#[derive(Debug, Clone)]
pub enum DepCondition {
    /// `NonEmpty(true)` requires a set, non-empty value;
    /// `NonEmpty(false)` requires the value to be absent or empty.
    NonEmpty(bool),
    Equals(String),
    Predicate(fn(&str) -> bool),
    Pattern(Regex),
}

impl DepCondition {
    pub fn satisfied(&self, value: Option<&str>) -> bool {
        match self {
            DepCondition::NonEmpty(want) => {
                let empty = value.is_none_or(str::is_empty);
                *want != empty
            }
            DepCondition::Equals(expected) => value == Some(expected.as_str()),
            DepCondition::Predicate(check) => check(value.unwrap_or("")),
            DepCondition::Pattern(pattern) => pattern.is_match(value.unwrap_or("")),
        }
    }
}

/// Conjunction of conditions, keyed by controlling field name.
#[derive(Debug, Clone, Default)]
pub struct DepRule {
    conditions: BTreeMap<String, DepCondition>,
}

impl DepRule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to be non-empty.
    pub fn on(field: impl Into<String>) -> Self {
        Self::new().field(field, DepCondition::NonEmpty(true))
    }

    /// Requires `field` to equal `value`.
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new().field(field, DepCondition::Equals(value.into()))
    }

    pub fn field(mut self, field: impl Into<String>, condition: DepCondition) -> Self {
        self.conditions.insert(field.into(), condition);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Every condition must hold against the looked-up values.
    pub fn satisfied<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        self.conditions
            .iter()
            .all(|(field, cond)| cond.satisfied(lookup(field).as_deref()))
    }
}

/// OR over the declared rules; no rules means always active.
pub fn is_active<F>(rules: &[DepRule], lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    rules.is_empty() || rules.iter().any(|rule| rule.satisfied(&lookup))
}

/// Reverse index from controlling field to the fields that must be
/// re-evaluated when it changes.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, dependent: &str, rules: &[DepRule]) {
        for rule in rules {
            for field in rule.fields() {
                self.dependents
                    .entry(field.to_string())
                    .or_default()
                    .insert(dependent.to_string());
            }
        }
    }

    pub fn dependents_of(&self, field: &str) -> impl Iterator<Item = &str> {
        self.dependents
            .get(field)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}
