use super::schema::Functions;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20231016_000001_initial_function_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Functions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Functions::Kind).string().not_null())
                    .col(ColumnDef::new(Functions::ResourceId).string().not_null())
                    .col(ColumnDef::new(Functions::AttributeId).string().not_null())
                    .col(ColumnDef::new(Functions::Xml).text().not_null())
                    .col(ColumnDef::new(Functions::Js).text().not_null())
                    .col(ColumnDef::new(Functions::ErrorMessage).text())
                    .col(ColumnDef::new(Functions::ErrorTimestamp).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Functions::Editable)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Functions::DryRun)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(Functions::Kind)
                            .col(Functions::ResourceId)
                            .col(Functions::AttributeId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("functions_resource")
                    .table(Functions::Table)
                    .col(Functions::Kind)
                    .col(Functions::ResourceId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("functions_resource")
                    .table(Functions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Functions::Table).to_owned())
            .await?;
        Ok(())
    }
}
