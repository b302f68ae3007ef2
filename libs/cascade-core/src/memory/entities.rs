use super::*;
use nanoid::nanoid;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct LinkInstance {
    link_type_id: String,
    documents: [String; 2],
}

#[derive(Debug, Default)]
struct Entities {
    owners: HashMap<String, ResourceReference>,
    members: BTreeMap<ResourceReference, Vec<String>>,
    values: HashMap<(AttributeRef, String), Value>,
    links: BTreeMap<String, LinkInstance>,
}

impl Entities {
    fn register(&mut self, resource: ResourceReference, id: String) {
        if self.owners.insert(id.clone(), resource.clone()).is_none() {
            self.members.entry(resource).or_default().push(id);
        }
    }

    fn instances<'a>(
        &'a self,
        document_id: &'a str,
        link_type_id: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a LinkInstance)> {
        self.links.iter().filter(move |(_, link)| {
            link.link_type_id == link_type_id && link.documents.iter().any(|d| d == document_id)
        })
    }
}

/// Documents, link instances and their values kept in memory.
#[derive(Debug, Default)]
pub struct MemoryEntityStorage {
    inner: RwLock<Entities>,
}

impl MemoryEntityStorage {
    pub async fn insert_document<C: Into<String>, I: Into<String>>(&self, collection_id: C, id: I) {
        self.inner
            .write()
            .await
            .register(ResourceReference::collection(collection_id), id.into());
    }

    /// Links two documents, returning the new link instance id.
    pub async fn link_documents<L: Into<String>>(
        &self,
        link_type_id: L,
        document1: &str,
        document2: &str,
    ) -> CascadeResult<String> {
        let mut inner = self.inner.write().await;
        for document in [document1, document2] {
            if !inner.owners.contains_key(document) {
                return Err(CascadeError::EntityNotFound(document.into()));
            }
        }
        let link_type_id = link_type_id.into();
        let id = nanoid!();
        inner.register(ResourceReference::link(&link_type_id), id.clone());
        inner.links.insert(
            id.clone(),
            LinkInstance {
                link_type_id,
                documents: [document1.into(), document2.into()],
            },
        );
        Ok(id)
    }

    pub async fn value(&self, attribute: &AttributeRef, entity_id: &str) -> Option<Value> {
        self.inner
            .read()
            .await
            .values
            .get(&(attribute.clone(), entity_id.to_owned()))
            .cloned()
    }
}

#[async_trait]
impl EntityStorage for MemoryEntityStorage {
    async fn get_attribute_value(
        &self,
        attribute: &AttributeRef,
        entity_id: &str,
    ) -> CascadeResult<Option<Value>> {
        Ok(self.value(attribute, entity_id).await)
    }

    async fn set_attribute_value(
        &self,
        attribute: &AttributeRef,
        entity_id: &str,
        value: Value,
    ) -> CascadeResult<()> {
        let mut inner = self.inner.write().await;
        let resource = attribute.resource();
        if inner.owners.get(entity_id) != Some(&resource) {
            return Err(CascadeError::EntityNotFound(format!(
                "{} in {}",
                entity_id, resource
            )));
        }
        inner
            .values
            .insert((attribute.clone(), entity_id.to_owned()), value);
        Ok(())
    }

    async fn create_entity(&self, resource: &ResourceReference) -> CascadeResult<String> {
        let id = nanoid!();
        self.inner.write().await.register(resource.clone(), id.clone());
        Ok(id)
    }

    async fn list_entities(&self, resource: &ResourceReference) -> CascadeResult<Vec<String>> {
        Ok(self
            .inner
            .read()
            .await
            .members
            .get(resource)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_linked_entities(
        &self,
        document_id: &str,
        link_type_id: &str,
    ) -> CascadeResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .instances(document_id, link_type_id)
            .filter_map(|(_, link)| link.documents.iter().find(|d| *d != document_id))
            .cloned()
            .collect())
    }

    async fn get_link_instances(
        &self,
        document_id: &str,
        link_type_id: &str,
    ) -> CascadeResult<Vec<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .instances(document_id, link_type_id)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_link_documents(
        &self,
        link_instance_id: &str,
        collection_id: &str,
    ) -> CascadeResult<Vec<String>> {
        let inner = self.inner.read().await;
        let collection = ResourceReference::collection(collection_id);
        Ok(inner
            .links
            .get(link_instance_id)
            .map(|link| {
                link.documents
                    .iter()
                    .filter(|d| inner.owners.get(*d) == Some(&collection))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
