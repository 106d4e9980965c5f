use sea_orm_migration::prelude::*;

use crate::m0001_create_videos::Videos;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Progress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Progress::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Progress::VideoId).string_len(20).not_null())
                    .col(ColumnDef::new(Progress::Round).integer().not_null())
                    .col(ColumnDef::new(Progress::Step).integer().not_null())
                    .col(ColumnDef::new(Progress::Notes).text().null())
                    .col(
                        ColumnDef::new(Progress::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_progress_video_id")
                            .from(Progress::Table, Progress::VideoId)
                            .to(Videos::Table, Videos::VideoId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_progress_video_id_created_at")
                    .table(Progress::Table)
                    .col(Progress::VideoId)
                    .col(Progress::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_progress_video_id_created_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Progress::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Progress {
    Table,
    Id,
    VideoId,
    Round,
    Step,
    Notes,
    CreatedAt,
}
