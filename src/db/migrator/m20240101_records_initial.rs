use crate::entities::order_records;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(order_records::Entity)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Single-column indexes backing the per-field filters.
        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_user_name")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::UserName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_client_name")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::ClientName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_order_ref")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::OrderRef)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_entry_date")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::EntryDate)
                    .to_owned(),
            )
            .await?;

        // Composite indexes for the common filter shapes: date-range scans
        // and per-user listings.
        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_process_entry")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::ProcessDate)
                    .col(OrderRecords::EntryDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_user_client")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::UserName)
                    .col(OrderRecords::ClientName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_records_created_at")
                    .table(OrderRecords::Table)
                    .col(OrderRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderRecords::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OrderRecords {
    Table,
    UserName,
    ClientName,
    OrderRef,
    EntryDate,
    ProcessDate,
    CreatedAt,
}
