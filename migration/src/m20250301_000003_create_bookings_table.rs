use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `bookings` table and its columns.
#[derive(DeriveIden)]
enum Bookings {
    Table,
    Id,
    ClientId,
    TechnicianId,
    Category,
    Description,
    Address,
    City,
    Latitude,
    Longitude,
    ScheduledAt,
    DurationMinutes,
    Status,
    EstimatedPrice,
    FinalPrice,
    PaymentMethod,
    PaymentReference,
    AmountPaid,
    ReceiptUrl,
    PaidAt,
    StatusReason,
    CancelledBy,
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
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bookings::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Bookings::ClientId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::TechnicianId).uuid().not_null())
                    .col(ColumnDef::new(Bookings::Category).string().not_null())
                    .col(ColumnDef::new(Bookings::Description).text().not_null())
                    .col(ColumnDef::new(Bookings::Address).string().not_null())
                    .col(ColumnDef::new(Bookings::City).string().not_null())
                    .col(ColumnDef::new(Bookings::Latitude).double().null())
                    .col(ColumnDef::new(Bookings::Longitude).double().null())
                    .col(
                        ColumnDef::new(Bookings::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::DurationMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Bookings::EstimatedPrice).double().null())
                    .col(ColumnDef::new(Bookings::FinalPrice).double().null())
                    .col(ColumnDef::new(Bookings::PaymentMethod).string().null())
                    .col(ColumnDef::new(Bookings::PaymentReference).string().null())
                    .col(ColumnDef::new(Bookings::AmountPaid).double().null())
                    .col(ColumnDef::new(Bookings::ReceiptUrl).text().null())
                    .col(
                        ColumnDef::new(Bookings::PaidAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Bookings::StatusReason).text().null())
                    .col(ColumnDef::new(Bookings::CancelledBy).uuid().null())
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_client_id")
                            .from(Bookings::Table, Bookings::ClientId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_technician_id")
                            .from(Bookings::Table, Bookings::TechnicianId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // SQLite cannot add constraints after the fact; it is only used in tests.
        if manager.get_database_backend() == DbBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE bookings ADD CONSTRAINT chk_bookings_status_valid CHECK (status IN ('pending', 'accepted', 'declined', 'on_the_way', 'in_progress', 'awaiting_payment', 'completed', 'cancelled'))",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bookings::Table).to_owned())
            .await
    }
}
