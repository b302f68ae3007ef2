use super::*;

enum Relation<'a> {
    /// same resource, same entity
    Local,
    /// documents linked through the link type
    Via(&'a str),
    /// link type function reading its documents
    LinkReadsDocument,
    /// collection function reading its link instances
    DocumentReadsLink,
    Unrelated,
}

fn relation(row: &DependencyEdge) -> Relation<'_> {
    if let Some(link_type_id) = row.via_link_type.as_deref() {
        return Relation::Via(link_type_id);
    }
    if row.is_local() {
        return Relation::Local;
    }
    match (row.function.kind, row.dependency.kind) {
        (ResourceKind::Link, ResourceKind::Collection) => Relation::LinkReadsDocument,
        (ResourceKind::Collection, ResourceKind::Link) => Relation::DocumentReadsLink,
        _ => Relation::Unrelated,
    }
}

/// Entities of `row.function` to recompute after `row.dependency` changed on `changed`.
pub(super) async fn dependents(
    entities: &dyn EntityStorage,
    row: &DependencyEdge,
    changed: &BTreeSet<String>,
) -> CascadeResult<BTreeSet<String>> {
    let function_resource = row.function.resource_id.as_str();
    let mut targets = BTreeSet::new();

    match relation(row) {
        Relation::Local => targets.extend(changed.iter().cloned()),
        Relation::Via(link_type_id) => {
            for entity in changed {
                targets.extend(entities.get_linked_entities(entity, link_type_id).await?);
            }
        }
        Relation::LinkReadsDocument => {
            for entity in changed {
                targets.extend(entities.get_link_instances(entity, function_resource).await?);
            }
        }
        Relation::DocumentReadsLink => {
            for entity in changed {
                targets.extend(entities.get_link_documents(entity, function_resource).await?);
            }
        }
        Relation::Unrelated => {
            targets.extend(entities.list_entities(&row.function.resource()).await?);
        }
    }

    Ok(targets)
}

/// Entities holding the values `row.function` reads when computed for `entity_id`.
pub(super) async fn dependencies(
    entities: &dyn EntityStorage,
    row: &DependencyEdge,
    entity_id: &str,
) -> CascadeResult<Vec<String>> {
    let dependency_resource = row.dependency.resource_id.as_str();

    match relation(row) {
        Relation::Local => Ok(vec![entity_id.to_owned()]),
        Relation::Via(link_type_id) => entities.get_linked_entities(entity_id, link_type_id).await,
        Relation::LinkReadsDocument => {
            entities
                .get_link_documents(entity_id, dependency_resource)
                .await
        }
        Relation::DocumentReadsLink => {
            entities
                .get_link_instances(entity_id, dependency_resource)
                .await
        }
        Relation::Unrelated => Ok(vec![]),
    }
}
