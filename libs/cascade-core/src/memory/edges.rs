use super::*;

type Rows = BTreeMap<AttributeRef, Vec<DependencyEdge>>;

#[derive(Debug, Default)]
pub struct MemoryEdgeStorage {
    pub(super) rows: RwLock<Rows>,
}

pub(super) fn replace_rows(rows: &mut Rows, function: &AttributeRef, edges: Vec<DependencyEdge>) {
    if edges.is_empty() {
        rows.remove(function);
    } else {
        rows.insert(function.clone(), edges);
    }
}

pub(super) fn remove_rows(rows: &mut Rows, function: &AttributeRef) -> u64 {
    rows.remove(function).map_or(0, |edges| edges.len() as u64)
}

/// Drops every row failing `keep`, returning how many went.
pub(super) fn retain_rows<F>(rows: &mut Rows, keep: F) -> u64
where
    F: Fn(&DependencyEdge) -> bool,
{
    let mut removed = 0;
    rows.retain(|_, edges| {
        let before = edges.len();
        edges.retain(|edge| keep(edge));
        removed += (before - edges.len()) as u64;
        !edges.is_empty()
    });
    removed
}

#[async_trait]
impl EdgeStorage for MemoryEdgeStorage {
    async fn replace_edges(
        &self,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<()> {
        replace_rows(&mut *self.rows.write().await, function, edges);
        Ok(())
    }

    async fn get_edges(&self, functions: &[AttributeRef]) -> CascadeResult<Vec<DependencyEdge>> {
        let rows = self.rows.read().await;
        Ok(functions
            .iter()
            .filter_map(|function| rows.get(function))
            .flatten()
            .cloned()
            .collect())
    }

    async fn get_dependents(
        &self,
        dependencies: &[AttributeRef],
    ) -> CascadeResult<Vec<DependencyEdge>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .flatten()
            .filter(|edge| dependencies.contains(&edge.dependency))
            .cloned()
            .collect())
    }

    async fn delete_function_edges(&self, function: &AttributeRef) -> CascadeResult<u64> {
        Ok(remove_rows(&mut *self.rows.write().await, function))
    }

    async fn delete_attribute_edges(&self, attribute: &AttributeRef) -> CascadeResult<u64> {
        let mut rows = self.rows.write().await;
        Ok(retain_rows(&mut rows, |edge| !edge.references_attribute(attribute)))
    }

    async fn delete_resource_edges(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        let mut rows = self.rows.write().await;
        Ok(retain_rows(&mut rows, |edge| !edge.references_resource(resource)))
    }
}
