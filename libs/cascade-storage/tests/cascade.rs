use cascade_core::*;
use cascade_storage::CascadeStorage;
use serde_json::json;
use std::sync::Arc;

fn sum() -> ClosureScriptRunner {
    ClosureScriptRunner::new(|_script: String, bindings: ScriptBindings| async move {
        let total: i64 = bindings
            .inputs
            .iter()
            .filter_map(|input| input.value.as_ref()?.as_i64())
            .sum();
        let write = ScriptWrite::new(bindings.function.clone(), json!(total));
        Ok(ScriptOutcome::default().write(write))
    })
}

fn reads(attributes: &[&str]) -> String {
    let blocks: String = attributes
        .iter()
        .map(|attribute| {
            format!(
                r#"<block type="get_attribute"><field name="ATTR">{attribute}</field><value name="DOCUMENT"><block type="variables_get_c1_document"/></value></block>"#
            )
        })
        .collect();
    format!("<xml>{blocks}</xml>")
}

#[tokio::test]
async fn cascades_over_persisted_functions() -> anyhow::Result<()> {
    cascade_logger::init_logger();
    let storage = Arc::new(CascadeStorage::new_with_migration("sqlite::memory:").await?);
    let entities = Arc::new(MemoryEntityStorage::default());
    let executor = CascadeExecutor::new(
        storage.clone(),
        entities.clone(),
        Arc::new(sum()),
        CascadeConfig::default(),
    );

    let (a1, a2, a3) = (
        AttributeRef::collection("c1", "a1"),
        AttributeRef::collection("c1", "a2"),
        AttributeRef::collection("c1", "a3"),
    );
    let known = KnownResources::default();
    executor
        .builder()
        .sync_function(&a3, Function::new(reads(&["a1", "a2"]), "sum"), &known)
        .await?;
    let synced = executor
        .builder()
        .sync_function(&a2, Function::new(reads(&["a1"]), "sum"), &known)
        .await?;
    assert_eq!(synced.edges, vec![DependencyEdge::new(a2.clone(), a1.clone())]);

    entities.insert_document("c1", "d1").await;
    entities.set_attribute_value(&a1, "d1", json!(3)).await?;

    let report = executor
        .on_value_changed(ChangeSet::new().with_value(a1.clone(), "d1"))
        .await?;
    assert_eq!(report.order(), vec![&a2, &a3]);
    assert_eq!(entities.value(&a3, "d1").await, Some(json!(6)));

    // functions and rows survive in the database
    assert_eq!(
        storage
            .resource_functions(&ResourceReference::collection("c1"))
            .await?,
        vec![a2.clone(), a3.clone()]
    );
    assert!(executor.builder().remove_function(&a2).await?);
    assert_eq!(storage.get_dependents(&[a2.clone()]).await?.len(), 1);
    assert!(storage.get_edges(&[a2.clone()]).await?.is_empty());

    Ok(())
}
