use super::*;
use crate::extractor::{extract_function_references, FunctionReferences};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFunction {
    pub edges: Vec<DependencyEdge>,
    pub references: FunctionReferences,
}

/// Keeps dependency rows consistent with function sources and loads pass graphs.
#[derive(Clone)]
pub struct GraphBuilder {
    storage: Arc<dyn GraphStorage>,
}

impl GraphBuilder {
    pub fn new(storage: Arc<dyn GraphStorage>) -> Self {
        Self { storage }
    }

    /// Stores `function` for `target` together with its new dependency rows.
    pub async fn sync_function(
        &self,
        target: &AttributeRef,
        function: Function,
        known: &KnownResources,
    ) -> CascadeResult<SyncedFunction> {
        let references = extract_function_references(&function, known);
        let edges = references.edges(target);

        self.storage
            .replace_function(target, function, edges.clone())
            .await?;
        debug!("function {} synced with {} dependencies", target, edges.len());

        Ok(SyncedFunction { edges, references })
    }

    pub async fn remove_function(&self, target: &AttributeRef) -> CascadeResult<bool> {
        let removal = self.storage.delete_function_with_edges(target).await?;
        debug!("function {} removed with {} rows", target, removal.rows);
        Ok(removal.functions > 0)
    }

    /// Drops the attribute's function and every row reading or computing it.
    pub async fn remove_attribute(&self, attribute: &AttributeRef) -> CascadeResult<u64> {
        let removal = self.storage.delete_attribute_with_edges(attribute).await?;
        debug!("attribute {} removed with {} rows", attribute, removal.rows);
        Ok(removal.rows)
    }

    pub async fn remove_resource(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        let removal = self.storage.delete_resource_with_edges(resource).await?;
        debug!(
            "resource {} removed with {} functions and {} rows",
            resource, removal.functions, removal.rows
        );
        Ok(removal.rows)
    }

    pub async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Vec<AttributeRef>> {
        self.storage.resource_functions(resource).await
    }

    /// Functions reading `changed`, directly or through other functions, plus `seeds`.
    pub async fn affected_graph(
        &self,
        changed: &[AttributeRef],
        seeds: &[AttributeRef],
    ) -> CascadeResult<FunctionGraph> {
        let mut functions: BTreeSet<AttributeRef> = seeds.iter().cloned().collect();
        let mut frontier: Vec<AttributeRef> = changed.iter().chain(seeds).cloned().collect();

        while !frontier.is_empty() {
            frontier = self
                .storage
                .get_dependents(&frontier)
                .await?
                .into_iter()
                .map(|row| row.function)
                .filter(|function| functions.insert(function.clone()))
                .collect();
        }

        if functions.is_empty() {
            return Ok(FunctionGraph::default());
        }
        let ids: Vec<_> = functions.iter().cloned().collect();
        let rows = self.storage.get_edges(&ids).await?;
        trace!("affected graph: {} functions, {} rows", ids.len(), rows.len());

        Ok(FunctionGraph::new(functions, rows))
    }
}
