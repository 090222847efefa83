use sea_orm_migration::prelude::*;

/// Adds the account-lifecycle columns to `users`.
#[derive(DeriveMigrationName)]
pub struct Migration;

/// Databases created after the columns joined the entity already have them
/// from the initial migration, so "duplicate column" is not an error here.
async fn add_column_additive(
    manager: &SchemaManager<'_>,
    stmt: TableAlterStatement,
) -> Result<(), DbErr> {
    match manager.alter_table(stmt).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("duplicate column") {
                return Ok(());
            }
            Err(e)
        }
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        add_column_additive(
            manager,
            Table::alter()
                .table(Users::Table)
                .add_column(
                    ColumnDef::new(Users::IsActive)
                        .boolean()
                        .not_null()
                        .default(true),
                )
                .to_owned(),
        )
        .await?;

        add_column_additive(
            manager,
            Table::alter()
                .table(Users::Table)
                .add_column(
                    ColumnDef::new(Users::IsDeleted)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .to_owned(),
        )
        .await?;

        add_column_additive(
            manager,
            Table::alter()
                .table(Users::Table)
                .add_column(ColumnDef::new(Users::ArchivedAt).text().null())
                .to_owned(),
        )
        .await?;

        add_column_additive(
            manager,
            Table::alter()
                .table(Users::Table)
                .add_column(
                    ColumnDef::new(Users::MustResetPassword)
                        .boolean()
                        .not_null()
                        .default(false),
                )
                .to_owned(),
        )
        .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_is_active")
                    .table(Users::Table)
                    .col(Users::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_is_deleted")
                    .table(Users::Table)
                    .col(Users::IsDeleted)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_users_is_deleted").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_users_is_active").to_owned())
            .await?;

        for col in [
            Users::MustResetPassword,
            Users::ArchivedAt,
            Users::IsDeleted,
            Users::IsActive,
        ] {
            manager
                .alter_table(Table::alter().table(Users::Table).drop_column(col).to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    IsActive,
    IsDeleted,
    ArchivedAt,
    MustResetPassword,
}
