use sqlx::migrate::Migrate;
use sqlx::PgPool;

use mentorbook_auth::PasswordService;
use mentorbook_common::{AppError, UserRole};

use crate::store::{NewAccount, NewExpertise, Store};

/// Expertise tags offered on a fresh install.
pub const DEFAULT_EXPERTISE: [&str; 20] = [
    "Python Development",
    "JavaScript/React",
    "Data Science",
    "Machine Learning",
    "Web Development",
    "Mobile Development",
    "DevOps",
    "Cloud Computing",
    "Database Design",
    "UI/UX Design",
    "Product Management",
    "Marketing",
    "Sales",
    "Leadership",
    "Career Development",
    "Interview Preparation",
    "Resume Writing",
    "Networking",
    "Public Speaking",
    "Project Management",
];

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_all_migrations(&self) -> Result<(), AppError> {
        tracing::info!("Starting database migrations...");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        tracing::info!("All migrations completed successfully");
        Ok(())
    }

    pub async fn check_migration_status(&self) -> Result<MigrationStatus, AppError> {
        let migrator = sqlx::migrate!("./migrations");
        let mut conn = self.pool.acquire().await?;

        conn.ensure_migrations_table()
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(|e| AppError::Database(e.into()))?;

        let total = migrator.iter().count();
        let applied_count = applied.len();
        let pending = total.saturating_sub(applied_count);

        Ok(MigrationStatus {
            total,
            applied: applied_count,
            pending,
            is_up_to_date: pending == 0,
        })
    }

    /// Drops every table, including the migration history.
    pub async fn reset(&self) -> Result<(), AppError> {
        tracing::warn!("Dropping public schema");
        sqlx::query("DROP SCHEMA public CASCADE")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE SCHEMA public")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MigrationStatus {
    pub total: usize,
    pub applied: usize,
    pub pending: usize,
    pub is_up_to_date: bool,
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Migrations: {}/{} applied, {} pending",
            self.applied, self.total, self.pending
        )
    }
}

/// Inserts the default expertise tags that are not present yet. Returns how
/// many were added.
pub async fn seed_expertise(store: &dyn Store) -> Result<usize, AppError> {
    let mut created = 0;
    for name in DEFAULT_EXPERTISE {
        if store.find_expertise_by_name(name).await?.is_some() {
            continue;
        }
        store
            .create_expertise(NewExpertise {
                name: name.to_string(),
                description: None,
            })
            .await?;
        created += 1;
    }

    tracing::info!("Seeded {} expertise tags", created);
    Ok(created)
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Creates the admin account unless the username is taken. Returns whether
/// an account was created.
pub async fn seed_admin(store: &dyn Store, admin: &AdminSeed, bcrypt_cost: u32) -> Result<bool, AppError> {
    if store.find_user_by_username(&admin.username).await?.is_some() {
        tracing::info!("Admin user {} already exists", admin.username);
        return Ok(false);
    }

    let hashed_password = PasswordService::hash_password(&admin.password, bcrypt_cost)?;
    store
        .create_account(NewAccount {
            username: admin.username.clone(),
            email: admin.email.clone(),
            hashed_password,
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Admin,
        })
        .await?;

    tracing::info!("Admin user {} created", admin.username);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(seed_expertise(&store).await.unwrap(), 20);
        assert_eq!(seed_expertise(&store).await.unwrap(), 0);
        assert_eq!(store.list_expertise().await.unwrap().len(), 20);

        let admin = AdminSeed {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password: "changeme".into(),
        };
        assert!(seed_admin(&store, &admin, 4).await.unwrap());
        assert!(!seed_admin(&store, &admin, 4).await.unwrap());

        let user = store.find_user_by_username("admin").await.unwrap().unwrap();
        let profile = store.find_profile_by_user(user.user_id).await.unwrap().unwrap();
        assert_eq!(profile.role, UserRole::Admin);
    }
}
