use sea_orm_migration::prelude::*;

#[derive(Iden)]
pub enum Functions {
    Table,
    Kind,
    ResourceId,
    AttributeId,
    Xml,
    Js,
    ErrorMessage,
    ErrorTimestamp,
    Editable,
    DryRun,
}

#[derive(Iden)]
pub enum FunctionEdges {
    Table,
    Id,
    Kind,
    ResourceId,
    AttributeId,
    DependencyKind,
    DependencyResourceId,
    DependencyAttributeId,
    ViaLinkType,
}
