use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `technician_profiles` table and its columns.
#[derive(DeriveIden)]
enum TechnicianProfiles {
    Table,
    Id,
    UserId,
    Category,
    Skills,
    Bio,
    HourlyRate,
    City,
    Address,
    Latitude,
    Longitude,
    YearsExperience,
    VerificationStatus,
    VerificationNote,
    IdDocumentUrl,
    IsOnline,
    AverageRating,
    ReviewCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TechnicianProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TechnicianProfiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::Category)
                            .string()
                            .not_null()
                            .default("other"),
                    )
                    .col(ColumnDef::new(TechnicianProfiles::Skills).text().null())
                    .col(ColumnDef::new(TechnicianProfiles::Bio).text().null())
                    .col(
                        ColumnDef::new(TechnicianProfiles::HourlyRate)
                            .double()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TechnicianProfiles::City).string().not_null())
                    .col(ColumnDef::new(TechnicianProfiles::Address).string().null())
                    .col(ColumnDef::new(TechnicianProfiles::Latitude).double().null())
                    .col(ColumnDef::new(TechnicianProfiles::Longitude).double().null())
                    .col(
                        ColumnDef::new(TechnicianProfiles::YearsExperience)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::VerificationStatus)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::VerificationNote)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::IdDocumentUrl)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::IsOnline)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::AverageRating)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::ReviewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TechnicianProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_technician_profiles_user_id")
                            .from(TechnicianProfiles::Table, TechnicianProfiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TechnicianProfiles::Table).to_owned())
            .await
    }
}
