use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Bookings {
    Table,
    ClientId,
    TechnicianId,
    ScheduledAt,
    Status,
}

#[derive(DeriveIden)]
enum Reviews {
    Table,
    TechnicianId,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    TechnicianId,
}

#[derive(DeriveIden)]
enum SubscriptionPayments {
    Table,
    TechnicianId,
}

#[derive(DeriveIden)]
enum TechnicianProfiles {
    Table,
    Category,
    City,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_client_id")
                    .table(Bookings::Table)
                    .col(Bookings::ClientId)
                    .to_owned(),
            )
            .await?;

        // Availability scans read a technician's bookings ordered by slot.
        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_technician_scheduled")
                    .table(Bookings::Table)
                    .col(Bookings::TechnicianId)
                    .col(Bookings::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_bookings_status")
                    .table(Bookings::Table)
                    .col(Bookings::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reviews_technician_id")
                    .table(Reviews::Table)
                    .col(Reviews::TechnicianId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_technician_id")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::TechnicianId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_payments_technician_id")
                    .table(SubscriptionPayments::Table)
                    .col(SubscriptionPayments::TechnicianId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_technician_profiles_category_city")
                    .table(TechnicianProfiles::Table)
                    .col(TechnicianProfiles::Category)
                    .col(TechnicianProfiles::City)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_bookings_client_id",
            "idx_bookings_technician_scheduled",
            "idx_bookings_status",
            "idx_reviews_technician_id",
            "idx_subscriptions_technician_id",
            "idx_subscription_payments_technician_id",
            "idx_technician_profiles_category_city",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        Ok(())
    }
}
