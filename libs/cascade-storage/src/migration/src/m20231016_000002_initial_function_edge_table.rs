use super::schema::FunctionEdges;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20231016_000002_initial_function_edge_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FunctionEdges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FunctionEdges::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FunctionEdges::Kind).string().not_null())
                    .col(ColumnDef::new(FunctionEdges::ResourceId).string().not_null())
                    .col(ColumnDef::new(FunctionEdges::AttributeId).string().not_null())
                    .col(ColumnDef::new(FunctionEdges::DependencyKind).string().not_null())
                    .col(
                        ColumnDef::new(FunctionEdges::DependencyResourceId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FunctionEdges::DependencyAttributeId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(FunctionEdges::ViaLinkType).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("function_edges_function")
                    .table(FunctionEdges::Table)
                    .col(FunctionEdges::Kind)
                    .col(FunctionEdges::ResourceId)
                    .col(FunctionEdges::AttributeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("function_edges_dependency")
                    .table(FunctionEdges::Table)
                    .col(FunctionEdges::DependencyKind)
                    .col(FunctionEdges::DependencyResourceId)
                    .col(FunctionEdges::DependencyAttributeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("function_edges_dependency")
                    .table(FunctionEdges::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("function_edges_function")
                    .table(FunctionEdges::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(FunctionEdges::Table).to_owned())
            .await?;
        Ok(())
    }
}
