use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::{ColumnDef, ForeignKeyAction, Index, Table};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Users {
    Table,
    SaeId,
    Email,
    PoolSizeLimit,
    CreatedAt,
    LastRefillAt,
}

#[derive(Iden)]
enum Keys {
    Table,
    KeyId,
    SaeId,
    KeyMaterial,
    State,
    CreatedAt,
    UsedAt,
    UsedBySaeId,
}

#[derive(Iden)]
enum LocalKmConfig {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(Iden)]
enum SyncLogs {
    Table,
    Id,
    Reason,
    Fallback,
    UsersSynced,
    KeysDelivered,
    ErrorDetail,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::SaeId).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(
                        ColumnDef::new(Users::PoolSizeLimit)
                            .big_integer()
                            .not_null()
                            .default(10),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::LastRefillAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Keys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Keys::KeyId).string().not_null().primary_key())
                    .col(ColumnDef::new(Keys::SaeId).string().not_null())
                    .col(ColumnDef::new(Keys::KeyMaterial).text().not_null())
                    .col(
                        ColumnDef::new(Keys::State)
                            .string()
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(Keys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Keys::UsedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Keys::UsedBySaeId).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_keys_sae_id")
                            .from(Keys::Table, Keys::SaeId)
                            .to(Users::Table, Users::SaeId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_keys_sae_id_state")
                    .table(Keys::Table)
                    .col(Keys::SaeId)
                    .col(Keys::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LocalKmConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LocalKmConfig::Key).string().not_null().primary_key())
                    .col(ColumnDef::new(LocalKmConfig::Value).text().not_null())
                    .col(
                        ColumnDef::new(LocalKmConfig::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncLogs::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(SyncLogs::Reason).string().not_null())
                    .col(ColumnDef::new(SyncLogs::Fallback).string().null())
                    .col(
                        ColumnDef::new(SyncLogs::UsersSynced)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLogs::KeysDelivered)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SyncLogs::ErrorDetail).text().null())
                    .col(
                        ColumnDef::new(SyncLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LocalKmConfig::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("ix_keys_sae_id_state")
                    .table(Keys::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Keys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
