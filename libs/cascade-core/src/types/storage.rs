use super::*;
use async_trait::async_trait;
use serde_json::Value;

/// Persistence of dependency rows, keyed by the function's output attribute.
#[async_trait]
pub trait EdgeStorage<E = CascadeError>: Send + Sync {
    /// replace every row owned by `function` with `edges` in one step
    async fn replace_edges(
        &self,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<(), E>;
    /// rows owned by any of the given functions
    async fn get_edges(&self, functions: &[AttributeRef]) -> CascadeResult<Vec<DependencyEdge>, E>;
    /// rows whose dependency is one of the given attributes
    async fn get_dependents(
        &self,
        dependencies: &[AttributeRef],
    ) -> CascadeResult<Vec<DependencyEdge>, E>;
    /// delete the rows owned by `function`
    async fn delete_function_edges(&self, function: &AttributeRef) -> CascadeResult<u64, E>;
    /// delete every row that has `attribute` as source or dependency
    async fn delete_attribute_edges(&self, attribute: &AttributeRef) -> CascadeResult<u64, E>;
    /// delete every row touching `resource` as source, dependency or traversed link type
    async fn delete_resource_edges(&self, resource: &ResourceReference) -> CascadeResult<u64, E>;
}

#[async_trait]
pub trait FunctionStorage<E = CascadeError>: Send + Sync {
    async fn get_function(&self, target: &AttributeRef) -> CascadeResult<Option<Function>, E>;
    /// create or overwrite the function computing `target`
    async fn set_function(&self, target: &AttributeRef, function: Function) -> CascadeResult<(), E>;
    async fn delete_function(&self, target: &AttributeRef) -> CascadeResult<bool, E>;
    async fn set_error_report(
        &self,
        target: &AttributeRef,
        report: Option<ErrorReport>,
    ) -> CascadeResult<(), E>;
    /// output attributes of the functions owned by `resource`
    async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Vec<AttributeRef>, E>;
    async fn delete_resource_functions(&self, resource: &ResourceReference)
        -> CascadeResult<u64, E>;
}

/// Functions and dependency rows removed together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removal {
    pub functions: u64,
    pub rows: u64,
}

/// Function writes that carry their dependency rows in the same step.
///
/// Each operation either lands completely or leaves both the function and its
/// rows untouched.
#[async_trait]
pub trait GraphStorage<E = CascadeError>: EdgeStorage<E> + FunctionStorage<E> {
    /// store `function` for `target` and replace the rows it owns with `edges`
    async fn replace_function(
        &self,
        target: &AttributeRef,
        function: Function,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<(), E>;
    /// delete the function computing `target` with the rows it owns
    async fn delete_function_with_edges(&self, target: &AttributeRef) -> CascadeResult<Removal, E>;
    /// delete the function computing `attribute` with every row touching it
    async fn delete_attribute_with_edges(
        &self,
        attribute: &AttributeRef,
    ) -> CascadeResult<Removal, E>;
    /// delete the functions owned by `resource` with every row touching it
    async fn delete_resource_with_edges(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Removal, E>;
}

/// Documents and link instances, as seen by the executor.
#[async_trait]
pub trait EntityStorage<E = CascadeError>: Send + Sync {
    async fn get_attribute_value(
        &self,
        attribute: &AttributeRef,
        entity_id: &str,
    ) -> CascadeResult<Option<Value>, E>;
    async fn set_attribute_value(
        &self,
        attribute: &AttributeRef,
        entity_id: &str,
        value: Value,
    ) -> CascadeResult<(), E>;
    async fn create_entity(&self, resource: &ResourceReference) -> CascadeResult<String, E>;
    async fn list_entities(&self, resource: &ResourceReference) -> CascadeResult<Vec<String>, E>;
    /// documents reachable from `document_id` through one instance of `link_type_id`
    async fn get_linked_entities(
        &self,
        document_id: &str,
        link_type_id: &str,
    ) -> CascadeResult<Vec<String>, E>;
    /// instances of `link_type_id` attached to `document_id`
    async fn get_link_instances(
        &self,
        document_id: &str,
        link_type_id: &str,
    ) -> CascadeResult<Vec<String>, E>;
    /// documents of `collection_id` joined by the link instance
    async fn get_link_documents(
        &self,
        link_instance_id: &str,
        collection_id: &str,
    ) -> CascadeResult<Vec<String>, E>;
}
