mod executor;
mod mapping;

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use executor::CascadeExecutor;

/// Attribute writes and function recomputations that start a cascade pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// written attributes with the entities they were written on
    pub values: BTreeMap<AttributeRef, BTreeSet<String>>,
    /// functions to recompute outright, with their entities
    pub functions: BTreeMap<AttributeRef, BTreeSet<String>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value<S: Into<String>>(mut self, attribute: AttributeRef, entity_id: S) -> Self {
        self.insert_value(attribute, entity_id);
        self
    }

    pub fn insert_value<S: Into<String>>(&mut self, attribute: AttributeRef, entity_id: S) {
        self.values
            .entry(attribute)
            .or_default()
            .insert(entity_id.into());
    }

    pub fn insert_function<S: Into<String>>(&mut self, function: AttributeRef, entity_id: S) {
        self.functions
            .entry(function)
            .or_default()
            .insert(entity_id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.functions.is_empty()
    }

    pub fn attributes(&self) -> Vec<AttributeRef> {
        self.values.keys().cloned().collect()
    }

    pub fn seeds(&self) -> Vec<AttributeRef> {
        self.functions.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionState {
    /// input changed, not scheduled yet
    Pending,
    /// part of the current pass order
    Ordered,
    Executing,
    /// writes committed
    Applied,
    /// error recorded on the function
    Failed,
}

/// One function computed for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRun {
    pub pass: usize,
    pub function: AttributeRef,
    pub entity_id: String,
    pub state: FunctionState,
    pub writes: Vec<ScriptWrite>,
    pub error: Option<String>,
}

impl FunctionRun {
    fn new(pass: usize, function: &AttributeRef, entity_id: &str) -> Self {
        Self {
            pass,
            function: function.clone(),
            entity_id: entity_id.to_owned(),
            state: FunctionState::Pending,
            writes: vec![],
            error: None,
        }
    }

    fn transition(&mut self, state: FunctionState) {
        trace!(
            "{} on {}: {:?} -> {:?}",
            self.function,
            self.entity_id,
            self.state,
            state
        );
        self.state = state;
    }

    fn failed<S: Into<String>>(mut self, message: S) -> Self {
        self.transition(FunctionState::Failed);
        self.error = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// passes that executed functions
    pub passes: usize,
    pub executed: Vec<FunctionRun>,
    /// entities created by scripts
    pub created: Vec<(ResourceReference, String)>,
    pub cancelled: bool,
    pub depth_exceeded: bool,
}

impl CascadeReport {
    pub fn runs_of<'a>(
        &'a self,
        function: &'a AttributeRef,
    ) -> impl Iterator<Item = &'a FunctionRun> {
        self.executed.iter().filter(move |run| &run.function == function)
    }

    pub fn count(&self, state: FunctionState) -> usize {
        self.executed.iter().filter(|run| run.state == state).count()
    }

    /// functions in execution order, one entry per run
    pub fn order(&self) -> Vec<&AttributeRef> {
        self.executed.iter().map(|run| &run.function).collect()
    }
}
