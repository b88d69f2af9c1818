use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Booking: owner lookups (list scoping, cap check)
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_user")
                    .table(Booking::Table)
                    .col(Booking::UserId)
                    .to_owned(),
            )
            .await?;

        // Booking: company lookups (nested route, cascade delete)
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_company")
                    .table(Booking::Table)
                    .col(Booking::CompanyId)
                    .to_owned(),
            )
            .await?;

        // UserCredentials: one credentials row per user
        manager
            .create_index(
                Index::create()
                    .name("uniq_user_credentials_user")
                    .table(UserCredentials::Table)
                    .col(UserCredentials::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Company: province is the common list filter
        manager
            .create_index(
                Index::create()
                    .name("idx_company_province")
                    .table(Company::Table)
                    .col(Company::Province)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_booking_user").table(Booking::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_booking_company").table(Booking::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uniq_user_credentials_user").table(UserCredentials::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_company_province").table(Company::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Booking { Table, UserId, CompanyId }

#[derive(DeriveIden)]
enum UserCredentials { Table, UserId }

#[derive(DeriveIden)]
enum Company { Table, Province }
