use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_catalog_tables::Migration),
            Box::new(m20240601_000002_create_proforma_tables::Migration),
            Box::new(m20240601_000003_create_informe_tables::Migration),
            Box::new(m20240601_000004_create_auth_tables::Migration),
        ]
    }
}

mod m20240601_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::Name).string_len(200).not_null())
                        .col(ColumnDef::new(Clients::Ruc).string_len(20).null())
                        .col(ColumnDef::new(Clients::Phone).string_len(20).null())
                        .col(ColumnDef::new(Clients::Address).text().null())
                        .col(ColumnDef::new(Clients::Email).string_len(254).null())
                        .col(ColumnDef::new(Clients::ContactPerson).string_len(100).null())
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Clients::UpdatedAt)
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
                        .name("idx_clients_name")
                        .table(Clients::Table)
                        .col(Clients::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parameters::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parameters::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parameters::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Parameters::Category).string_len(16).not_null())
                        .col(ColumnDef::new(Parameters::DefaultUnit).string_len(50).null())
                        .col(ColumnDef::new(Parameters::DefaultPrice).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Parameters::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Parameters::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (table, index) in [
                (Methods::Table.into_iden(), "idx_methods_category"),
                (Techniques::Table.into_iden(), "idx_techniques_category"),
            ] {
                manager
                    .create_table(
                        Table::create()
                            .table(table.clone())
                            .if_not_exists()
                            .col(ColumnDef::new(CatalogEntry::Id).uuid().primary_key().not_null())
                            .col(ColumnDef::new(CatalogEntry::Name).string_len(200).not_null())
                            .col(ColumnDef::new(CatalogEntry::Description).text().null())
                            .col(ColumnDef::new(CatalogEntry::Category).string_len(16).not_null())
                            .col(
                                ColumnDef::new(CatalogEntry::IsActive)
                                    .boolean()
                                    .not_null()
                                    .default(true),
                            )
                            .col(
                                ColumnDef::new(CatalogEntry::CreatedAt)
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
                            .name(index)
                            .table(table)
                            .col(CatalogEntry::Category)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_parameters_category")
                        .table(Parameters::Table)
                        .col(Parameters::Category)
                        .to_owned(),
                )
                .await?;

            for table in [TiposMuestra::Table.into_iden(), AnalisisCatalogo::Table.into_iden()] {
                manager
                    .create_table(
                        Table::create()
                            .table(table)
                            .if_not_exists()
                            .col(ColumnDef::new(FlatCatalog::Id).uuid().primary_key().not_null())
                            .col(ColumnDef::new(FlatCatalog::Tipo).string_len(100).not_null())
                            .col(ColumnDef::new(FlatCatalog::Parametro).string_len(200).not_null())
                            .col(ColumnDef::new(FlatCatalog::Unidad).string_len(50).not_null())
                            .col(ColumnDef::new(FlatCatalog::Metodo).string_len(200).not_null())
                            .col(ColumnDef::new(FlatCatalog::Tecnica).string_len(200).not_null())
                            .col(ColumnDef::new(FlatCatalog::Precio).decimal_len(12, 2).not_null())
                            .col(
                                ColumnDef::new(FlatCatalog::CreatedAt)
                                    .timestamp_with_time_zone()
                                    .not_null(),
                            )
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(CompanySettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CompanySettings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CompanySettings::CompanyName).string_len(200).not_null())
                        .col(ColumnDef::new(CompanySettings::CompanyAddress).text().not_null())
                        .col(ColumnDef::new(CompanySettings::CompanyPhone).string_len(20).not_null())
                        .col(ColumnDef::new(CompanySettings::CompanyEmail).string_len(254).not_null())
                        .col(ColumnDef::new(CompanySettings::CompanyRuc).string_len(20).not_null())
                        .col(ColumnDef::new(CompanySettings::CompanyLogo).string_len(500).null())
                        .col(
                            ColumnDef::new(CompanySettings::ProformaPrefix)
                                .string_len(10)
                                .not_null()
                                .default("PRF"),
                        )
                        .col(
                            ColumnDef::new(CompanySettings::NextProformaNumber)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(CompanySettings::TaxRate)
                                .decimal_len(6, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CompanySettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                CompanySettings::Table.into_iden(),
                AnalisisCatalogo::Table.into_iden(),
                TiposMuestra::Table.into_iden(),
                Techniques::Table.into_iden(),
                Methods::Table.into_iden(),
                Parameters::Table.into_iden(),
                Clients::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).if_exists().to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Clients {
        Table,
        Id,
        Name,
        Ruc,
        Phone,
        Address,
        Email,
        ContactPerson,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Parameters {
        Table,
        Id,
        Name,
        Category,
        DefaultUnit,
        DefaultPrice,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Methods {
        Table,
    }

    #[derive(DeriveIden)]
    pub(super) enum Techniques {
        Table,
    }

    /// Columns shared by methods and techniques
    #[derive(DeriveIden)]
    pub(super) enum CatalogEntry {
        Id,
        Name,
        Description,
        Category,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum TiposMuestra {
        Table,
    }

    #[derive(DeriveIden)]
    enum AnalisisCatalogo {
        Table,
    }

    /// Columns shared by the two flat catalogs
    #[derive(DeriveIden)]
    enum FlatCatalog {
        Id,
        Tipo,
        Parametro,
        Unidad,
        Metodo,
        Tecnica,
        Precio,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum CompanySettings {
        Table,
        Id,
        CompanyName,
        CompanyAddress,
        CompanyPhone,
        CompanyEmail,
        CompanyRuc,
        CompanyLogo,
        ProformaPrefix,
        NextProformaNumber,
        TaxRate,
        UpdatedAt,
    }
}

mod m20240601_000002_create_proforma_tables {
    use super::m20240601_000001_create_catalog_tables::{
        CatalogEntry, Clients, Methods, Parameters, Techniques,
    };
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000002_create_proforma_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Proformas::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Proformas::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Proformas::ClientId).uuid().not_null())
                        .col(
                            ColumnDef::new(Proformas::ProformaNumber)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Proformas::Date).date().not_null())
                        .col(
                            ColumnDef::new(Proformas::Status)
                                .string_len(16)
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Proformas::Subtotal).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Proformas::TaxAmount).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Proformas::Total).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Proformas::CreatedBy).string_len(100).null())
                        .col(ColumnDef::new(Proformas::PdfPath).string_len(500).null())
                        .col(
                            ColumnDef::new(Proformas::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Proformas::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_proformas_client_id")
                                .from(Proformas::Table, Proformas::ClientId)
                                .to(Clients::Table, Clients::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_proformas_client_id")
                        .table(Proformas::Table)
                        .col(Proformas::ClientId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Analyses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Analyses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Analyses::ProformaId).uuid().not_null())
                        .col(ColumnDef::new(Analyses::ParameterId).uuid().not_null())
                        .col(ColumnDef::new(Analyses::MethodId).uuid().not_null())
                        .col(ColumnDef::new(Analyses::TechniqueId).uuid().null())
                        .col(ColumnDef::new(Analyses::Unit).string_len(50).null())
                        .col(ColumnDef::new(Analyses::UnitPrice).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Analyses::Quantity)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Analyses::Subtotal).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Analyses::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Analyses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Analyses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_analyses_proforma_id")
                                .from(Analyses::Table, Analyses::ProformaId)
                                .to(Proformas::Table, Proformas::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_analyses_parameter_id")
                                .from(Analyses::Table, Analyses::ParameterId)
                                .to(Parameters::Table, Parameters::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_analyses_method_id")
                                .from(Analyses::Table, Analyses::MethodId)
                                .to(Methods::Table, CatalogEntry::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_analyses_technique_id")
                                .from(Analyses::Table, Analyses::TechniqueId)
                                .to(Techniques::Table, CatalogEntry::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_analyses_proforma_id")
                        .table(Analyses::Table)
                        .col(Analyses::ProformaId)
                        .col(Analyses::Position)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Analyses::Table).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Proformas::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Proformas {
        Table,
        Id,
        ClientId,
        ProformaNumber,
        Date,
        Status,
        Subtotal,
        TaxAmount,
        Total,
        CreatedBy,
        PdfPath,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Analyses {
        Table,
        Id,
        ProformaId,
        ParameterId,
        MethodId,
        TechniqueId,
        Unit,
        UnitPrice,
        Quantity,
        Subtotal,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240601_000003_create_informe_tables {
    use super::m20240601_000002_create_proforma_tables::Proformas;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000003_create_informe_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Informes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Informes::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Informes::ProformaId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Informes::FechaEmision)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Informes::TomadoPor).string_len(200).null())
                        .col(ColumnDef::new(Informes::Procedimiento).text().null())
                        .col(ColumnDef::new(Informes::AnalizadoPor).string_len(200).null())
                        .col(ColumnDef::new(Informes::PdfPath).string_len(500).null())
                        .col(
                            ColumnDef::new(Informes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_informes_proforma_id")
                                .from(Informes::Table, Informes::ProformaId)
                                .to(Proformas::Table, Proformas::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Resultados::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Resultados::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Resultados::InformeId).uuid().not_null())
                        .col(ColumnDef::new(Resultados::Parameter).string_len(200).not_null())
                        .col(ColumnDef::new(Resultados::Unit).string_len(50).null())
                        .col(ColumnDef::new(Resultados::Method).string_len(200).null())
                        .col(ColumnDef::new(Resultados::Resultados).string_len(100).null())
                        .col(ColumnDef::new(Resultados::Limite).string_len(100).null())
                        .col(ColumnDef::new(Resultados::Incertidumbre).string_len(100).null())
                        .col(
                            ColumnDef::new(Resultados::Position)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_resultados_informe_id")
                                .from(Resultados::Table, Resultados::InformeId)
                                .to(Informes::Table, Informes::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_resultados_informe_id")
                        .table(Resultados::Table)
                        .col(Resultados::InformeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Resultados::Table).if_exists().to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Informes::Table).if_exists().to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Informes {
        Table,
        Id,
        ProformaId,
        FechaEmision,
        TomadoPor,
        Procedimiento,
        AnalizadoPor,
        PdfPath,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Resultados {
        Table,
        Id,
        InformeId,
        Parameter,
        Unit,
        Method,
        Resultados,
        Limite,
        Incertidumbre,
        Position,
    }
}

mod m20240601_000004_create_auth_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000004_create_auth_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Email)
                                .string_len(254)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::IsAdmin)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserSessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(UserSessions::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(UserSessions::TokenHash)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(UserSessions::UserId).uuid().not_null())
                        .col(ColumnDef::new(UserSessions::Username).string_len(150).not_null())
                        .col(
                            ColumnDef::new(UserSessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(UserSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_sessions_user_id")
                                .from(UserSessions::Table, UserSessions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PasswordResetTokens::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PasswordResetTokens::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PasswordResetTokens::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(PasswordResetTokens::TokenHash)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PasswordResetTokens::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PasswordResetTokens::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PasswordResetTokens::UsedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_password_reset_tokens_user_id")
                                .from(PasswordResetTokens::Table, PasswordResetTokens::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                PasswordResetTokens::Table.into_iden(),
                UserSessions::Table.into_iden(),
                Users::Table.into_iden(),
            ] {
                manager
                    .drop_table(Table::drop().table(table).if_exists().to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Username,
        Email,
        PasswordHash,
        IsAdmin,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum UserSessions {
        Table,
        Id,
        TokenHash,
        UserId,
        Username,
        ExpiresAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum PasswordResetTokens {
        Table,
        Id,
        UserId,
        TokenHash,
        ExpiresAt,
        CreatedAt,
        UsedAt,
    }
}
