use sea_orm_migration::prelude::*;

/// Draw Sessions (轮盘抽奖会话)
#[derive(DeriveIden)]
enum DrawSessions {
    Table,
    Id,
    BatchId,
    ActiveBatchId,
    Mode,
    Status,
    Spins,
    MaxSpins,
    Meta,
    CreatedAt,
    FinishedAt,
}

/// Draw Spins (每次抽取记录)
#[derive(DeriveIden)]
enum DrawSpins {
    Table,
    Id,
    SessionId,
    PrizeId,
    TokenId,
    WeightSnapshot,
    SpinOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Batches {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// active_batch_id: 会话 ACTIVE 时等于 batch_id，FINISHED 后置 NULL。
/// 唯一索引保证同一批次同时最多一个 ACTIVE 会话（多个 NULL 不冲突）。
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DrawSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DrawSessions::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DrawSessions::BatchId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DrawSessions::ActiveBatchId)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(DrawSessions::Mode).string_len(16).not_null())
                    .col(
                        ColumnDef::new(DrawSessions::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DrawSessions::Spins)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DrawSessions::MaxSpins).integer().not_null())
                    .col(ColumnDef::new(DrawSessions::Meta).text().not_null())
                    .col(
                        ColumnDef::new(DrawSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DrawSessions::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draw_sessions_batch")
                            .from(DrawSessions::Table, DrawSessions::BatchId)
                            .to(Batches::Table, Batches::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_draw_sessions_active_batch_unique")
                    .table(DrawSessions::Table)
                    .col(DrawSessions::ActiveBatchId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DrawSpins::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DrawSpins::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DrawSpins::SessionId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DrawSpins::PrizeId).string_len(64).not_null())
                    .col(ColumnDef::new(DrawSpins::TokenId).string_len(64).null())
                    .col(
                        ColumnDef::new(DrawSpins::WeightSnapshot)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DrawSpins::SpinOrder).integer().not_null())
                    .col(
                        ColumnDef::new(DrawSpins::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_draw_spins_session")
                            .from(DrawSpins::Table, DrawSpins::SessionId)
                            .to(DrawSessions::Table, DrawSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一会话内序号唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_draw_spins_session_order_unique")
                    .table(DrawSpins::Table)
                    .col(DrawSpins::SessionId)
                    .col(DrawSpins::SpinOrder)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(DrawSpins::Table).to_owned())
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(DrawSessions::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
