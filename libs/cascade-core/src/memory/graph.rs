use super::{
    edges::{remove_rows, replace_rows, retain_rows},
    functions::remove_resource_functions,
    *,
};

/// Functions and dependency rows behind one pair of locks.
///
/// Combined writes take the function lock before the row lock.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    edges: MemoryEdgeStorage,
    functions: MemoryFunctionStorage,
}

#[async_trait]
impl EdgeStorage for MemoryStorage {
    async fn replace_edges(
        &self,
        function: &AttributeRef,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<()> {
        self.edges.replace_edges(function, edges).await
    }

    async fn get_edges(&self, functions: &[AttributeRef]) -> CascadeResult<Vec<DependencyEdge>> {
        self.edges.get_edges(functions).await
    }

    async fn get_dependents(
        &self,
        dependencies: &[AttributeRef],
    ) -> CascadeResult<Vec<DependencyEdge>> {
        self.edges.get_dependents(dependencies).await
    }

    async fn delete_function_edges(&self, function: &AttributeRef) -> CascadeResult<u64> {
        self.edges.delete_function_edges(function).await
    }

    async fn delete_attribute_edges(&self, attribute: &AttributeRef) -> CascadeResult<u64> {
        self.edges.delete_attribute_edges(attribute).await
    }

    async fn delete_resource_edges(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        self.edges.delete_resource_edges(resource).await
    }
}

#[async_trait]
impl FunctionStorage for MemoryStorage {
    async fn get_function(&self, target: &AttributeRef) -> CascadeResult<Option<Function>> {
        self.functions.get_function(target).await
    }

    async fn set_function(&self, target: &AttributeRef, function: Function) -> CascadeResult<()> {
        self.functions.set_function(target, function).await
    }

    async fn delete_function(&self, target: &AttributeRef) -> CascadeResult<bool> {
        self.functions.delete_function(target).await
    }

    async fn set_error_report(
        &self,
        target: &AttributeRef,
        report: Option<ErrorReport>,
    ) -> CascadeResult<()> {
        self.functions.set_error_report(target, report).await
    }

    async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Vec<AttributeRef>> {
        self.functions.resource_functions(resource).await
    }

    async fn delete_resource_functions(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        self.functions.delete_resource_functions(resource).await
    }
}

#[async_trait]
impl GraphStorage for MemoryStorage {
    async fn replace_function(
        &self,
        target: &AttributeRef,
        function: Function,
        edges: Vec<DependencyEdge>,
    ) -> CascadeResult<()> {
        let mut functions = self.functions.functions.write().await;
        let mut rows = self.edges.rows.write().await;
        functions.insert(target.clone(), function);
        replace_rows(&mut rows, target, edges);
        Ok(())
    }

    async fn delete_function_with_edges(&self, target: &AttributeRef) -> CascadeResult<Removal> {
        let mut functions = self.functions.functions.write().await;
        let mut rows = self.edges.rows.write().await;
        Ok(Removal {
            functions: functions.remove(target).map_or(0, |_| 1),
            rows: remove_rows(&mut rows, target),
        })
    }

    async fn delete_attribute_with_edges(
        &self,
        attribute: &AttributeRef,
    ) -> CascadeResult<Removal> {
        let mut functions = self.functions.functions.write().await;
        let mut rows = self.edges.rows.write().await;
        Ok(Removal {
            functions: functions.remove(attribute).map_or(0, |_| 1),
            rows: retain_rows(&mut rows, |edge| !edge.references_attribute(attribute)),
        })
    }

    async fn delete_resource_with_edges(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Removal> {
        let mut functions = self.functions.functions.write().await;
        let mut rows = self.edges.rows.write().await;
        Ok(Removal {
            functions: remove_resource_functions(&mut functions, resource),
            rows: retain_rows(&mut rows, |edge| !edge.references_resource(resource)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn combined_writes_keep_rows_with_their_function() -> anyhow::Result<()> {
        let storage = MemoryStorage::default();
        let (a1, a2, a3) = (
            AttributeRef::collection("c1", "a1"),
            AttributeRef::collection("c1", "a2"),
            AttributeRef::collection("c1", "a3"),
        );

        storage
            .replace_function(
                &a3,
                Function::new("", "sum"),
                vec![
                    DependencyEdge::new(a3.clone(), a1.clone()),
                    DependencyEdge::new(a3.clone(), a2.clone()),
                ],
            )
            .await?;
        storage
            .replace_function(
                &a2,
                Function::new("", ""),
                vec![DependencyEdge::new(a2.clone(), a1.clone())],
            )
            .await?;
        assert_eq!(storage.get_edges(&[a3.clone()]).await?.len(), 2);

        storage.replace_function(&a3, Function::new("", "product"), vec![]).await?;
        assert!(storage.get_edges(&[a3.clone()]).await?.is_empty());
        assert_eq!(storage.get_function(&a3).await?.map(|f| f.js), Some("product".into()));

        assert_eq!(
            storage.delete_attribute_with_edges(&a1).await?,
            Removal { functions: 0, rows: 1 }
        );
        assert_eq!(
            storage.delete_function_with_edges(&a3).await?,
            Removal { functions: 1, rows: 0 }
        );
        assert_eq!(
            storage
                .delete_resource_with_edges(&ResourceReference::collection("c1"))
                .await?,
            Removal { functions: 1, rows: 0 }
        );
        assert!(storage.get_function(&a2).await?.is_none());

        Ok(())
    }
}
