use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240501_000001_create_invoices_table::Migration),
            Box::new(m20240501_000002_create_invoice_audit_table::Migration),
        ]
    }
}

mod m20240501_000001_create_invoices_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000001_create_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::invoice::Model
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::CustomerName).string().not_null())
                        .col(ColumnDef::new(Invoices::CustomerEmail).string().not_null())
                        .col(ColumnDef::new(Invoices::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Invoices::Items).json().not_null())
                        .col(ColumnDef::new(Invoices::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Invoices::SubtotalMinor)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::AdvanceMinor).big_integer().not_null())
                        .col(
                            ColumnDef::new(Invoices::RemainingMinor)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::TotalMinor).big_integer().not_null())
                        .col(
                            ColumnDef::new(Invoices::VisitTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::Status).string().not_null())
                        .col(ColumnDef::new(Invoices::PaymentStatus).string().not_null())
                        .col(ColumnDef::new(Invoices::GatewayOrderId).string().null())
                        .col(ColumnDef::new(Invoices::GatewayPaymentId).string().null())
                        .col(ColumnDef::new(Invoices::Restaurant).json().not_null())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Invoices::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_customer_email")
                        .table(Invoices::Table)
                        .col(Invoices::CustomerEmail)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_status")
                        .table(Invoices::Table)
                        .col(Invoices::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoices_created_at")
                        .table(Invoices::Table)
                        .col(Invoices::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Invoices {
        Table,
        Id,
        InvoiceNumber,
        CustomerName,
        CustomerEmail,
        CustomerPhone,
        Items,
        Currency,
        SubtotalMinor,
        AdvanceMinor,
        RemainingMinor,
        TotalMinor,
        VisitTime,
        Status,
        PaymentStatus,
        GatewayOrderId,
        GatewayPaymentId,
        Restaurant,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240501_000002_create_invoice_audit_table {

    use super::m20240501_000001_create_invoices_table::Invoices;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240501_000002_create_invoice_audit_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InvoiceAudit::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InvoiceAudit::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InvoiceAudit::InvoiceId).uuid().not_null())
                        .col(ColumnDef::new(InvoiceAudit::Action).string().not_null())
                        .col(ColumnDef::new(InvoiceAudit::Detail).json().not_null())
                        .col(
                            ColumnDef::new(InvoiceAudit::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_invoice_audit_invoice")
                                .from(InvoiceAudit::Table, InvoiceAudit::InvoiceId)
                                .to(Invoices::Table, Invoices::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_invoice_audit_invoice_id")
                        .table(InvoiceAudit::Table)
                        .col(InvoiceAudit::InvoiceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceAudit::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InvoiceAudit {
        Table,
        Id,
        InvoiceId,
        Action,
        Detail,
        CreatedAt,
    }
}
