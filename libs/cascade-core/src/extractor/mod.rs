mod blockly;
mod script;
mod xml;

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// An attribute a function reads, possibly through a link type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRead {
    pub attribute: AttributeRef,
    pub via_link_type: Option<String>,
}

impl AttributeRead {
    pub fn new(attribute: AttributeRef) -> Self {
        Self {
            attribute,
            via_link_type: None,
        }
    }

    pub fn via<S: Into<String>>(attribute: AttributeRef, link_type_id: S) -> Self {
        Self {
            attribute,
            via_link_type: Some(link_type_id.into()),
        }
    }
}

/// Everything one function's sources touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionReferences {
    pub attributes: BTreeSet<AttributeRead>,
    pub resources: BTreeSet<ResourceReference>,
    /// host API references of the compiled script, first occurrence first
    pub script_calls: Vec<ResourceReference>,
}

impl FunctionReferences {
    pub fn add_resource(&mut self, resource: ResourceReference) -> bool {
        self.resources.insert(resource)
    }

    /// Dependency rows for the function computing `target`.
    ///
    /// A read of `target` itself on the same entity is not a dependency.
    pub fn edges(&self, target: &AttributeRef) -> Vec<DependencyEdge> {
        self.attributes
            .iter()
            .filter(|read| !(read.via_link_type.is_none() && &read.attribute == target))
            .map(|read| DependencyEdge {
                function: target.clone(),
                dependency: read.attribute.clone(),
                via_link_type: read.via_link_type.clone(),
            })
            .collect()
    }
}

/// Resources and attribute reads of a serialized visual program.
pub fn extract_blockly_references(
    xml: &str,
) -> (BTreeSet<ResourceReference>, BTreeSet<AttributeRead>) {
    blockly::extract_blockly(xml)
}

/// Resources named by host API calls in a compiled script, in first-occurrence order.
pub fn extract_script_references(js: &str, known: &KnownResources) -> Vec<ResourceReference> {
    script::extract_script(js, known)
}

pub fn extract_references(xml: &str, js: &str, known: &KnownResources) -> FunctionReferences {
    let (mut resources, attributes) = blockly::extract_blockly(xml);
    for read in &attributes {
        resources.insert(read.attribute.resource());
        if let Some(link_type) = &read.via_link_type {
            resources.insert(ResourceReference::link(link_type));
        }
    }

    let script_calls = script::extract_script(js, known);
    resources.extend(script_calls.iter().cloned());

    trace!(
        "extracted {} attribute reads and {} resources",
        attributes.len(),
        resources.len()
    );

    FunctionReferences {
        attributes,
        resources,
        script_calls,
    }
}

pub fn extract_function_references(
    function: &Function,
    known: &KnownResources,
) -> FunctionReferences {
    extract_references(&function.xml, &function.js, known)
}
