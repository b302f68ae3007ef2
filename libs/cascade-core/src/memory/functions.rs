use super::*;

#[derive(Debug, Default)]
pub struct MemoryFunctionStorage {
    pub(super) functions: RwLock<BTreeMap<AttributeRef, Function>>,
}

pub(super) fn remove_resource_functions(
    functions: &mut BTreeMap<AttributeRef, Function>,
    resource: &ResourceReference,
) -> u64 {
    let before = functions.len();
    functions.retain(|target, _| !target.belongs_to(resource.kind, &resource.resource_id));
    (before - functions.len()) as u64
}

#[async_trait]
impl FunctionStorage for MemoryFunctionStorage {
    async fn get_function(&self, target: &AttributeRef) -> CascadeResult<Option<Function>> {
        Ok(self.functions.read().await.get(target).cloned())
    }

    async fn set_function(&self, target: &AttributeRef, function: Function) -> CascadeResult<()> {
        self.functions.write().await.insert(target.clone(), function);
        Ok(())
    }

    async fn delete_function(&self, target: &AttributeRef) -> CascadeResult<bool> {
        Ok(self.functions.write().await.remove(target).is_some())
    }

    async fn set_error_report(
        &self,
        target: &AttributeRef,
        report: Option<ErrorReport>,
    ) -> CascadeResult<()> {
        match self.functions.write().await.get_mut(target) {
            Some(function) => {
                function.error_report = report;
                Ok(())
            }
            None => Err(CascadeError::FunctionNotFound(target.clone())),
        }
    }

    async fn resource_functions(
        &self,
        resource: &ResourceReference,
    ) -> CascadeResult<Vec<AttributeRef>> {
        Ok(self
            .functions
            .read()
            .await
            .keys()
            .filter(|target| target.belongs_to(resource.kind, &resource.resource_id))
            .cloned()
            .collect())
    }

    async fn delete_resource_functions(&self, resource: &ResourceReference) -> CascadeResult<u64> {
        Ok(remove_resource_functions(&mut *self.functions.write().await, resource))
    }
}
