pub use sea_orm;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub mod entities;

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opts = ConnectOptions::new(database_url);
    if database_url.contains(":memory:") {
        // Every pooled connection to an in-memory SQLite opens a fresh, empty database.
        opts.max_connections(1).min_connections(1);
    }
    Database::connect(opts).await
}
