pub use sea_orm_migration::prelude::*;

mod m20261016_000001_create_prize_ledger;
mod m20261016_000002_add_draw_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261016_000001_create_prize_ledger::Migration),
            Box::new(m20261016_000002_add_draw_sessions::Migration),
        ]
    }
}
