use std::sync::Arc;

use anyhow::Result;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::Role;
use crate::model::user::UserDraft;
use crate::store::memory::MemoryStore;
use crate::store::mysql::MySqlStore;
use crate::store::{Store, StoreError, UserStore};

/// Connects and brings the schema up to date.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, StoreError> {
    let pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Picks the backend from configuration.
pub async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let pool = init_db(url, config.db_max_connections).await?;
            info!("Using MySQL store");
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Creates the configured admin account if no user exists yet.
pub async fn bootstrap_admin(store: &dyn Store, config: &Config) -> Result<()> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    if store.count_users().await? > 0 {
        return Ok(());
    }

    let user = store
        .insert_user(UserDraft {
            username: username.trim().to_lowercase(),
            password: hash_password(password)?,
            full_name: "Administrator".to_string(),
            mobile_number: None,
            role: Role::Admin,
        })
        .await?;

    info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn bootstrap_runs_once() {
        let store = MemoryStore::new();
        let mut config = Config::for_tests();
        config.admin_username = Some("Boss".into());
        config.admin_password = Some("boss-password".into());

        bootstrap_admin(&store, &config).await.unwrap();
        bootstrap_admin(&store, &config).await.unwrap();

        assert_eq!(store.count_users().await.unwrap(), 1);
        let admin = store.find_user_by_username("boss").await.unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[actix_web::test]
    async fn bootstrap_skips_without_credentials() {
        let store = MemoryStore::new();
        bootstrap_admin(&store, &Config::for_tests()).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
    }
}
