use super::*;

/// "`function` reads `dependency`", one dependency target per row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub function: AttributeRef,
    pub dependency: AttributeRef,
    /// Link type traversed from the function's documents to reach the dependency.
    pub via_link_type: Option<String>,
}

impl DependencyEdge {
    pub fn new(function: AttributeRef, dependency: AttributeRef) -> Self {
        Self {
            function,
            dependency,
            via_link_type: None,
        }
    }

    pub fn via<S: Into<String>>(mut self, link_type_id: S) -> Self {
        self.via_link_type = Some(link_type_id.into());
        self
    }

    /// True when the row reads an attribute of the resource that owns the function.
    pub fn is_local(&self) -> bool {
        self.via_link_type.is_none()
            && self.function.kind == self.dependency.kind
            && self.function.resource_id == self.dependency.resource_id
    }

    pub fn references_attribute(&self, attribute: &AttributeRef) -> bool {
        &self.function == attribute || &self.dependency == attribute
    }

    pub fn references_resource(&self, resource: &ResourceReference) -> bool {
        self.function.belongs_to(resource.kind, &resource.resource_id)
            || self.dependency.belongs_to(resource.kind, &resource.resource_id)
            || (resource.kind == ResourceKind::Link
                && self.via_link_type.as_deref() == Some(resource.resource_id.as_str()))
    }
}
