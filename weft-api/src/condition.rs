//! Typed conditions on entity status
//!
//! Every entity carries a set of conditions with one slot per type. Setting
//! a condition whose status is unchanged preserves the original transition
//! time, so repeated reconciles of a steady state are idempotent.

use serde::{Deserialize, Serialize};
use weft_shared::Timestamp;

/// Condition truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// A named (type, status, reason, message) slot with its last transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Timestamp>,
}

impl Condition {
    pub fn new(type_: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Condition collection with one slot per type.
///
/// Callers must serialize concurrent mutation of one entity; the engine
/// guarantees this because only one worker owns a key at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(Vec<Condition>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the slot for `condition.type_`.
    ///
    /// A status change stamps `last_transition_time = now`; an unchanged
    /// status keeps the previous transition time while adopting the new
    /// reason and message.
    pub fn set(&mut self, mut condition: Condition) {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                } else {
                    condition.last_transition_time = Some(Timestamp::now());
                }
                *existing = condition;
            }
            None => {
                if condition.last_transition_time.is_none() {
                    condition.last_transition_time = Some(Timestamp::now());
                }
                self.0.push(condition);
            }
        }
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    pub fn is_false(&self, type_: &str) -> bool {
        self.get(type_)
            .is_some_and(|c| c.status == ConditionStatus::False)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    /// Equality on (type, status, reason, message), ignoring transition
    /// timestamps. Reconcilers use this to skip no-op status writes that
    /// would otherwise re-trigger themselves through the watch stream.
    pub fn content_eq(&self, other: &ConditionSet) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(other.0.iter()).all(|(a, b)| {
                a.type_ == b.type_
                    && a.status == b.status
                    && a.reason == b.reason
                    && a.message == b.message
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_condition_is_appended_with_transition_time() {
        let mut set = ConditionSet::new();
        set.set(Condition::new("Ready", ConditionStatus::True).with_reason("AllChecksPassed"));
        let ready = set.get("Ready").unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert!(ready.last_transition_time.is_some());
        assert!(set.is_true("Ready"));
    }

    #[test]
    fn same_status_preserves_transition_time() {
        let mut set = ConditionSet::new();
        set.set(Condition::new("Ready", ConditionStatus::True));
        let first = set.get("Ready").unwrap().last_transition_time;

        set.set(Condition::new("Ready", ConditionStatus::True).with_message("still fine"));
        let ready = set.get("Ready").unwrap();
        assert_eq!(ready.last_transition_time, first);
        assert_eq!(ready.message, "still fine");
    }

    #[test]
    fn status_change_advances_transition_time() {
        let mut set = ConditionSet::new();
        set.set(Condition::new("Ready", ConditionStatus::True));
        let first = set.get("Ready").unwrap().last_transition_time.unwrap();

        set.set(Condition::new("Ready", ConditionStatus::False).with_reason("HeartbeatStale"));
        let ready = set.get("Ready").unwrap();
        assert!(ready.last_transition_time.unwrap() >= first);
        assert!(set.is_false("Ready"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn one_slot_per_type() {
        let mut set = ConditionSet::new();
        set.set(Condition::new("Ready", ConditionStatus::True));
        set.set(Condition::new("Distributed", ConditionStatus::False));
        set.set(Condition::new("Ready", ConditionStatus::Unknown));
        assert_eq!(set.len(), 2);
    }
}
