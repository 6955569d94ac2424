use sea_orm_migration::prelude::*;

/// Prizes (奖品目录)
#[derive(DeriveIden)]
enum Prizes {
    Table,
    Id,
    Key,
    Label,
    Color,
    Stock,
    Active,
    EmittedTotal,
    LastEmittedAt,
    CreatedAt,
    UpdatedAt,
}

/// Batches (批次)
#[derive(DeriveIden)]
enum Batches {
    Table,
    Id,
    Description,
    StaticTargetUrl,
    IsReusable,
    CreatedAt,
}

/// Tokens (签名奖券)
#[derive(DeriveIden)]
enum Tokens {
    Table,
    Id,
    PrizeId,
    BatchId,
    Kind,
    ExpiresAt,
    Signature,
    SignatureVersion,
    Disabled,
    MaxUses,
    UsedCount,
    StartTime,
    EndTime,
    RevealedAt,
    AssignedPrizeId,
    DeliveredAt,
    DeliveredByUserId,
    DeliveryNote,
    RedeemedAt,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 计数字段 emitted_total / last_emitted_at 仅在发放时更新。
/// tokens.redeemed_at 为旧版单阶段兑换字段，两阶段交付时与 delivered_at 同步写入。
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Prizes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Prizes::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Prizes::Key).string_len(64).not_null())
                    .col(ColumnDef::new(Prizes::Label).string_len(255).not_null())
                    .col(ColumnDef::new(Prizes::Color).string_len(32).null())
                    .col(
                        ColumnDef::new(Prizes::Stock)
                            .big_integer()
                            .null(), // NULL = 无限库存
                    )
                    .col(
                        ColumnDef::new(Prizes::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Prizes::EmittedTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Prizes::LastEmittedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Prizes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Prizes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_prizes_key_unique")
                    .table(Prizes::Table)
                    .col(Prizes::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Batches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Batches::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Batches::Description).text().null())
                    .col(ColumnDef::new(Batches::StaticTargetUrl).text().null())
                    .col(
                        ColumnDef::new(Batches::IsReusable)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Batches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tokens::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tokens::PrizeId).string_len(64).not_null())
                    .col(ColumnDef::new(Tokens::BatchId).string_len(64).not_null())
                    .col(ColumnDef::new(Tokens::Kind).json().not_null())
                    .col(
                        ColumnDef::new(Tokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tokens::Signature).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Tokens::SignatureVersion)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Tokens::Disabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Tokens::MaxUses)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Tokens::UsedCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Tokens::StartTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::EndTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::RevealedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::AssignedPrizeId)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::DeliveredByUserId)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(Tokens::DeliveryNote).text().null())
                    .col(
                        ColumnDef::new(Tokens::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // 历史奖券保留：不使用 ON DELETE CASCADE
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tokens_prize")
                            .from(Tokens::Table, Tokens::PrizeId)
                            .to(Prizes::Table, Prizes::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tokens_batch")
                            .from(Tokens::Table, Tokens::BatchId)
                            .to(Batches::Table, Batches::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 批次维度查询（抽奖池、统计）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tokens_batch")
                    .table(Tokens::Table)
                    .col(Tokens::BatchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tokens_prize")
                    .table(Tokens::Table)
                    .col(Tokens::PrizeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：奖券 -> 批次 -> 奖品
        manager
            .drop_table(Table::drop().if_exists().table(Tokens::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Batches::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Prizes::Table).to_owned())
            .await?;

        Ok(())
    }
}
