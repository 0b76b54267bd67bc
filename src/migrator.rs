use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_manifests_table::Migration),
            Box::new(m20240301_000002_create_shipments_table::Migration),
            Box::new(m20240301_000003_create_customs_documents_table::Migration),
            Box::new(m20240301_000004_create_orm_requests_table::Migration),
            Box::new(m20240301_000005_create_saved_recipients_table::Migration),
            Box::new(m20240301_000006_create_logs_table::Migration),
            Box::new(m20240301_000007_create_ledger_entries_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_manifests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_manifests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtManifests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtManifests::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(BrtManifests::Reference)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BrtManifests::OfficialNumber).string().null())
                        .col(ColumnDef::new(BrtManifests::OfficialUrl).string().null())
                        .col(ColumnDef::new(BrtManifests::OfficialPdfPath).string().null())
                        .col(ColumnDef::new(BrtManifests::PdfPath).string().null())
                        .col(
                            ColumnDef::new(BrtManifests::GeneratedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(BrtManifests::ShipmentCount).integer().not_null())
                        .col(ColumnDef::new(BrtManifests::ParcelCount).integer().not_null())
                        .col(ColumnDef::new(BrtManifests::TotalWeightKg).double().not_null())
                        .col(ColumnDef::new(BrtManifests::TotalVolumeM3).double().not_null())
                        .col(ColumnDef::new(BrtManifests::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(BrtManifests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtManifests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum BrtManifests {
        Table,
        Id,
        Reference,
        OfficialNumber,
        OfficialUrl,
        OfficialPdfPath,
        PdfPath,
        GeneratedAt,
        ShipmentCount,
        ParcelCount,
        TotalWeightKg,
        TotalVolumeM3,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240301_000002_create_shipments_table {
    use super::m20240301_000001_create_manifests_table::BrtManifests;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtShipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtShipments::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::SenderCustomerCode)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::NumericReference)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::AlphanumericReference)
                                .string_len(80)
                                .null(),
                        )
                        .col(ColumnDef::new(BrtShipments::DepartureDepot).string().null())
                        .col(ColumnDef::new(BrtShipments::ArrivalTerminal).string().null())
                        .col(ColumnDef::new(BrtShipments::ArrivalDepot).string().null())
                        .col(ColumnDef::new(BrtShipments::DeliveryZone).string().null())
                        .col(ColumnDef::new(BrtShipments::ParcelNumberFrom).string().null())
                        .col(ColumnDef::new(BrtShipments::ParcelNumberTo).string().null())
                        .col(
                            ColumnDef::new(BrtShipments::NumberOfParcels)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(BrtShipments::WeightKg).double().not_null())
                        .col(ColumnDef::new(BrtShipments::VolumeM3).double().null())
                        .col(ColumnDef::new(BrtShipments::ConsigneeName).string().not_null())
                        .col(ColumnDef::new(BrtShipments::ConsigneeAddress).string().not_null())
                        .col(ColumnDef::new(BrtShipments::ConsigneeZip).string().not_null())
                        .col(ColumnDef::new(BrtShipments::ConsigneeCity).string().not_null())
                        .col(ColumnDef::new(BrtShipments::ConsigneeProvince).string().null())
                        .col(
                            ColumnDef::new(BrtShipments::ConsigneeCountry)
                                .string_len(2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BrtShipments::ConsigneeEmail).string().null())
                        .col(ColumnDef::new(BrtShipments::ConsigneePhone).string().null())
                        .col(ColumnDef::new(BrtShipments::Status).string_len(16).not_null())
                        .col(ColumnDef::new(BrtShipments::ExecutionCode).big_integer().null())
                        .col(ColumnDef::new(BrtShipments::ExecutionDescription).string().null())
                        .col(ColumnDef::new(BrtShipments::ExecutionMessage).text().null())
                        .col(ColumnDef::new(BrtShipments::LabelPath).string().null())
                        .col(ColumnDef::new(BrtShipments::ParcelId).string().null())
                        .col(ColumnDef::new(BrtShipments::TrackingId).string().null())
                        .col(ColumnDef::new(BrtShipments::TrackingPayload).text().null())
                        .col(
                            ColumnDef::new(BrtShipments::TrackingUpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(BrtShipments::ManifestId).integer().null())
                        .col(
                            ColumnDef::new(BrtShipments::ManifestGeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(BrtShipments::RequestPayload).text().null())
                        .col(ColumnDef::new(BrtShipments::ResponsePayload).text().null())
                        .col(ColumnDef::new(BrtShipments::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(BrtShipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtShipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_brt_shipments_manifest")
                                .from(BrtShipments::Table, BrtShipments::ManifestId)
                                .to(BrtManifests::Table, BrtManifests::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("ux_brt_shipments_sender_reference")
                        .table(BrtShipments::Table)
                        .col(BrtShipments::SenderCustomerCode)
                        .col(BrtShipments::NumericReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_brt_shipments_manifest")
                        .table(BrtShipments::Table)
                        .col(BrtShipments::ManifestId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtShipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum BrtShipments {
        Table,
        Id,
        SenderCustomerCode,
        NumericReference,
        AlphanumericReference,
        DepartureDepot,
        ArrivalTerminal,
        ArrivalDepot,
        DeliveryZone,
        ParcelNumberFrom,
        ParcelNumberTo,
        NumberOfParcels,
        WeightKg,
        VolumeM3,
        ConsigneeName,
        ConsigneeAddress,
        ConsigneeZip,
        ConsigneeCity,
        ConsigneeProvince,
        ConsigneeCountry,
        ConsigneeEmail,
        ConsigneePhone,
        Status,
        ExecutionCode,
        ExecutionDescription,
        ExecutionMessage,
        LabelPath,
        ParcelId,
        TrackingId,
        TrackingPayload,
        TrackingUpdatedAt,
        ManifestId,
        ManifestGeneratedAt,
        ConfirmedAt,
        DeletedAt,
        RequestPayload,
        ResponsePayload,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_customs_documents_table {
    use super::m20240301_000002_create_shipments_table::BrtShipments;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_customs_documents_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtCustomsDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::ShipmentId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BrtCustomsDocuments::Category).string().not_null())
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::GoodsDescription)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::GoodsValue)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::GoodsCurrency)
                                .string_len(3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::GoodsOriginCountry)
                                .string_len(2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(BrtCustomsDocuments::HsCode).string_len(10).null())
                        .col(ColumnDef::new(BrtCustomsDocuments::Incoterm).string_len(3).not_null())
                        .col(ColumnDef::new(BrtCustomsDocuments::SenderVat).string().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::SenderEori).string().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::ReceiverVat).string().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::ReceiverEori).string().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::Notes).text().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::InvoicePath).string().null())
                        .col(ColumnDef::new(BrtCustomsDocuments::DeclarationPath).string().null())
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::GeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(BrtCustomsDocuments::LastError).text().null())
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtCustomsDocuments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_brt_customs_documents_shipment")
                                .from(BrtCustomsDocuments::Table, BrtCustomsDocuments::ShipmentId)
                                .to(BrtShipments::Table, BrtShipments::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtCustomsDocuments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BrtCustomsDocuments {
        Table,
        Id,
        ShipmentId,
        Status,
        Category,
        GoodsDescription,
        GoodsValue,
        GoodsCurrency,
        GoodsOriginCountry,
        HsCode,
        Incoterm,
        SenderVat,
        SenderEori,
        ReceiverVat,
        ReceiverEori,
        Notes,
        InvoicePath,
        DeclarationPath,
        GeneratedAt,
        LastError,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_orm_requests_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_orm_requests_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtOrmRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtOrmRequests::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(BrtOrmRequests::ReservationNumber).string().null())
                        .col(ColumnDef::new(BrtOrmRequests::Status).string_len(16).not_null())
                        .col(ColumnDef::new(BrtOrmRequests::RemoteStatus).string().null())
                        .col(ColumnDef::new(BrtOrmRequests::CollectionDate).date().not_null())
                        .col(ColumnDef::new(BrtOrmRequests::PayerType).string_len(16).not_null())
                        .col(ColumnDef::new(BrtOrmRequests::NumberOfParcels).integer().not_null())
                        .col(ColumnDef::new(BrtOrmRequests::WeightKg).double().not_null())
                        .col(ColumnDef::new(BrtOrmRequests::RequestPayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::ResponsePayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::LastRequestPayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::LastResponsePayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::RemotePayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::FormPayload).text().null())
                        .col(ColumnDef::new(BrtOrmRequests::ErrorsPayload).text().null())
                        .col(
                            ColumnDef::new(BrtOrmRequests::LastSyncedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(BrtOrmRequests::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(BrtOrmRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtOrmRequests::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_brt_orm_requests_reservation")
                        .table(BrtOrmRequests::Table)
                        .col(BrtOrmRequests::ReservationNumber)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtOrmRequests::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BrtOrmRequests {
        Table,
        Id,
        ReservationNumber,
        Status,
        RemoteStatus,
        CollectionDate,
        PayerType,
        NumberOfParcels,
        WeightKg,
        RequestPayload,
        ResponsePayload,
        LastRequestPayload,
        LastResponsePayload,
        RemotePayload,
        FormPayload,
        ErrorsPayload,
        LastSyncedAt,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000005_create_saved_recipients_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_saved_recipients_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtSavedRecipients::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtSavedRecipients::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(BrtSavedRecipients::Label)
                                .string_len(120)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BrtSavedRecipients::CompanyName).string().not_null())
                        .col(ColumnDef::new(BrtSavedRecipients::Address).string().not_null())
                        .col(ColumnDef::new(BrtSavedRecipients::Zip).string().not_null())
                        .col(ColumnDef::new(BrtSavedRecipients::City).string().not_null())
                        .col(ColumnDef::new(BrtSavedRecipients::Province).string().null())
                        .col(ColumnDef::new(BrtSavedRecipients::Country).string_len(2).not_null())
                        .col(ColumnDef::new(BrtSavedRecipients::ContactName).string().null())
                        .col(ColumnDef::new(BrtSavedRecipients::Phone).string().null())
                        .col(ColumnDef::new(BrtSavedRecipients::Email).string().null())
                        .col(
                            ColumnDef::new(BrtSavedRecipients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BrtSavedRecipients::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtSavedRecipients::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BrtSavedRecipients {
        Table,
        Id,
        Label,
        CompanyName,
        Address,
        Zip,
        City,
        Province,
        Country,
        ContactName,
        Phone,
        Email,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000006_create_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BrtLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BrtLogs::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(BrtLogs::Level).string_len(16).not_null())
                        .col(ColumnDef::new(BrtLogs::Message).text().not_null())
                        .col(ColumnDef::new(BrtLogs::Context).text().null())
                        .col(ColumnDef::new(BrtLogs::Actor).string().null())
                        .col(
                            ColumnDef::new(BrtLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BrtLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BrtLogs {
        Table,
        Id,
        Level,
        Message,
        Context,
        Actor,
        CreatedAt,
    }
}

mod m20240301_000007_create_ledger_entries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_ledger_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // The ledger is shared with the accounting screens; only create it
            // when this service runs against a fresh database.
            manager
                .create_table(
                    Table::create()
                        .table(LedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(LedgerEntries::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(LedgerEntries::Reference).string_len(80).not_null())
                        .col(ColumnDef::new(LedgerEntries::Description).string().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(LedgerEntries::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(LedgerEntries::Kind).string_len(16).not_null())
                        .col(ColumnDef::new(LedgerEntries::Category).string().not_null())
                        .col(ColumnDef::new(LedgerEntries::EntryDate).date().not_null())
                        .col(
                            ColumnDef::new(LedgerEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_ledger_entries_reference")
                        .table(LedgerEntries::Table)
                        .col(LedgerEntries::Reference)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum LedgerEntries {
        Table,
        Id,
        Reference,
        Description,
        Amount,
        Currency,
        Kind,
        Category,
        EntryDate,
        CreatedAt,
    }
}
