//! Create `company` table.
//!
//! Bookable companies; `name` is unique, `tel` is the only optional field.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Company::Table)
                    .if_not_exists()
                    .col(uuid(Company::Id).primary_key())
                    .col(string_len(Company::Name, 50).unique_key().not_null())
                    .col(text(Company::Business).not_null())
                    .col(text(Company::Address).not_null())
                    .col(string_len(Company::Province, 128).not_null())
                    .col(string_len(Company::Postalcode, 5).not_null())
                    .col(ColumnDef::new(Company::Tel).string_len(32).null())
                    .col(text(Company::Picture).not_null())
                    .col(timestamp_with_time_zone(Company::CreatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Company::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Company { Table, Id, Name, Business, Address, Province, Postalcode, Tel, Picture, CreatedAt }
