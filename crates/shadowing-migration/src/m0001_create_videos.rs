use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Videos::VideoId)
                            .string_len(20)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Videos::Title).string_len(500).not_null())
                    .col(ColumnDef::new(Videos::Duration).big_integer().not_null())
                    .col(ColumnDef::new(Videos::Thumbnail).string_len(500).null())
                    .col(ColumnDef::new(Videos::Transcript).json().not_null())
                    .col(
                        ColumnDef::new(Videos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Videos {
    Table,
    VideoId,
    Title,
    Duration,
    Thumbnail,
    Transcript,
    CreatedAt,
}
