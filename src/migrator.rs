use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_request_tables::Migration),
            Box::new(m20240101_000003_create_purchase_order_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Employees::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::DepartmentId).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserProfiles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(UserProfiles::UserId)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(UserProfiles::Role).string_len(16).not_null())
                        .col(ColumnDef::new(UserProfiles::EmployeeId).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Products::Description).string().not_null())
                        .col(ColumnDef::new(Products::CategoryId).integer().null())
                        .col(ColumnDef::new(Products::InternalCode).string().null())
                        .col(
                            ColumnDef::new(Products::MinStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MaxStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Providers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Providers::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Providers::Name).string().not_null())
                        .col(ColumnDef::new(Providers::TaxId).string().not_null())
                        .col(ColumnDef::new(Providers::ContactEmail).string().null())
                        .col(ColumnDef::new(Providers::Phone).string().null())
                        .col(ColumnDef::new(Providers::ContributorType).string().null())
                        .col(ColumnDef::new(Providers::WithholdingPercent).decimal().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inventory::ProductId)
                                .integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Inventory::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Inventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_product_id")
                                .from(Inventory::Table, Inventory::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Providers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(UserProfiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Employees {
        Table,
        Id,
        Name,
        DepartmentId,
    }

    #[derive(DeriveIden)]
    enum UserProfiles {
        Table,
        UserId,
        Role,
        EmployeeId,
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Description,
        CategoryId,
        InternalCode,
        MinStock,
        MaxStock,
    }

    #[derive(DeriveIden)]
    pub(super) enum Providers {
        Table,
        Id,
        Name,
        TaxId,
        ContactEmail,
        Phone,
        ContributorType,
        WithholdingPercent,
    }

    #[derive(DeriveIden)]
    enum Inventory {
        Table,
        ProductId,
        Quantity,
        UpdatedAt,
    }
}

mod m20240101_000002_create_request_tables {
    use super::m20240101_000001_create_catalog_tables::{Employees, Products};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequests::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Description)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::SubmittedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequests::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseRequests::EmployeeId).integer().null())
                        .col(
                            ColumnDef::new(PurchaseRequests::DepartmentId)
                                .integer()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_requests_employee_id")
                                .from(PurchaseRequests::Table, PurchaseRequests::EmployeeId)
                                .to(Employees::Table, Employees::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_requests_status")
                        .table(PurchaseRequests::Table)
                        .col(PurchaseRequests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseRequestItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseRequestItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestItems::RequestId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestItems::ProductId)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseRequestItems::CustomDescription)
                                .string()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_request_items_request_id")
                                .from(PurchaseRequestItems::Table, PurchaseRequestItems::RequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_request_items_product_id")
                                .from(PurchaseRequestItems::Table, PurchaseRequestItems::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_request_items_product_id")
                        .table(PurchaseRequestItems::Table)
                        .col(PurchaseRequestItems::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConsolidatedOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsolidatedOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ConsolidatedOrders::ProviderId).integer().null())
                        .col(
                            ColumnDef::new(ConsolidatedOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsolidatedOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConsolidatedOrders::Products).json().not_null())
                        .col(ColumnDef::new(ConsolidatedOrders::RequestIds).json().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsolidatedOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseRequestItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PurchaseRequests {
        Table,
        Id,
        Description,
        SubmittedAt,
        Status,
        EmployeeId,
        DepartmentId,
    }

    #[derive(DeriveIden)]
    enum PurchaseRequestItems {
        Table,
        Id,
        RequestId,
        ProductId,
        Quantity,
        CustomDescription,
    }

    #[derive(DeriveIden)]
    enum ConsolidatedOrders {
        Table,
        Id,
        ProviderId,
        CreatedAt,
        Status,
        Products,
        RequestIds,
    }
}

mod m20240101_000003_create_purchase_order_tables {
    use super::m20240101_000001_create_catalog_tables::Providers;
    use super::m20240101_000002_create_request_tables::PurchaseRequests;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_purchase_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::RequestId).integer().null())
                        .col(ColumnDef::new(PurchaseOrders::ProviderId).integer().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(PurchaseOrders::Currency).string_len(8).not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Subtotal)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Vat)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::VatWithheld)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::NetPayable)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::WithholdingPercent)
                                .decimal()
                                .not_null()
                                .default(75),
                        )
                        .col(ColumnDef::new(PurchaseOrders::EmployeeId).integer().null())
                        .col(ColumnDef::new(PurchaseOrders::ChangedBy).uuid().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_provider_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::ProviderId)
                                .to(Providers::Table, Providers::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_request_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::RequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderItems::PurchaseOrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderItems::ProductId).integer().null())
                        .col(ColumnDef::new(PurchaseOrderItems::Description).string().null())
                        .col(ColumnDef::new(PurchaseOrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(PurchaseOrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(PurchaseOrderItems::LineTotal).decimal().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_items_order_id")
                                .from(PurchaseOrderItems::Table, PurchaseOrderItems::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderRequests::PurchaseOrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrderRequests::RequestId)
                                .integer()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(PurchaseOrderRequests::PurchaseOrderId)
                                .col(PurchaseOrderRequests::RequestId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_requests_order_id")
                                .from(
                                    PurchaseOrderRequests::Table,
                                    PurchaseOrderRequests::PurchaseOrderId,
                                )
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_requests_request_id")
                                .from(PurchaseOrderRequests::Table, PurchaseOrderRequests::RequestId)
                                .to(PurchaseRequests::Table, PurchaseRequests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Notifications::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Notifications::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Notifications::RecipientId).uuid().not_null())
                        .col(ColumnDef::new(Notifications::Title).string().not_null())
                        .col(ColumnDef::new(Notifications::Message).text().not_null())
                        .col(
                            ColumnDef::new(Notifications::Read)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Notifications::CreatedAt)
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
                        .name("idx_notifications_recipient_id")
                        .table(Notifications::Table)
                        .col(Notifications::RecipientId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Notifications::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderRequests::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PurchaseOrders {
        Table,
        Id,
        RequestId,
        ProviderId,
        OrderDate,
        Status,
        Currency,
        Subtotal,
        Vat,
        VatWithheld,
        NetPayable,
        WithholdingPercent,
        EmployeeId,
        ChangedBy,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderItems {
        Table,
        Id,
        PurchaseOrderId,
        ProductId,
        Description,
        Quantity,
        UnitPrice,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum PurchaseOrderRequests {
        Table,
        PurchaseOrderId,
        RequestId,
    }

    #[derive(DeriveIden)]
    enum Notifications {
        Table,
        Id,
        RecipientId,
        Title,
        Message,
        Read,
        CreatedAt,
    }
}
