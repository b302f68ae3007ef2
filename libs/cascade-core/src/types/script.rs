use super::*;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One input value handed to a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptInput {
    pub attribute: AttributeRef,
    pub entity_id: String,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptBindings {
    pub function: AttributeRef,
    /// document or link instance the function is computed for
    pub entity_id: String,
    pub inputs: Vec<ScriptInput>,
}

impl ScriptBindings {
    pub fn input(&self, attribute: &AttributeRef) -> Option<&Value> {
        self.inputs
            .iter()
            .find(|input| &input.attribute == attribute && input.entity_id == self.entity_id)
            .or_else(|| self.inputs.iter().find(|input| &input.attribute == attribute))
            .and_then(|input| input.value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptWrite {
    pub attribute: AttributeRef,
    /// `None` targets the entity the function runs for
    pub entity_id: Option<String>,
    pub value: Value,
}

impl ScriptWrite {
    pub fn new(attribute: AttributeRef, value: Value) -> Self {
        Self {
            attribute,
            entity_id: None,
            value,
        }
    }

    pub fn on<S: Into<String>>(mut self, entity_id: S) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub writes: Vec<ScriptWrite>,
    /// entities the script asked to create
    pub created: Vec<ResourceReference>,
    pub error: Option<String>,
}

impl ScriptOutcome {
    pub fn write(mut self, write: ScriptWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Sandboxed interpreter of compiled rule scripts.
#[async_trait]
pub trait ScriptRunner<E = CascadeError>: Send + Sync {
    async fn run(
        &self,
        script: &str,
        bindings: ScriptBindings,
        timeout: Duration,
    ) -> CascadeResult<ScriptOutcome, E>;
}
