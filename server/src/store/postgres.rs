use lib::types::{RegistrationToken, Role, UserPatch};
use sqlx::{
    PgPool, Postgres, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use tracing::info;

use super::{Credential, RegistrationTxn, Store, StoreError};

/// Advisory lock key serializing root-bootstrap checks across connections.
const ROOT_BOOTSTRAP_LOCK: i64 = 0x6869_7665_7761_7901;

const USER_COLUMNS: &str = "id, username, salt, rounds, password_hash, role, name, email";
const TOKEN_COLUMNS: &str = "id, role, name, notes, created_at, created_by";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Backend(Box::new(err)))?;
        info!("connected to postgres, migrations applied");
        Ok(Self { pool })
    }

    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Backend(Box::new(err))
}

fn role_from_row(row: &PgRow, column: &str) -> Result<Role, StoreError> {
    let raw: i16 = row.try_get(column)?;
    Role::try_from(i64::from(raw)).map_err(decode_err)
}

fn credential_from_row(row: &PgRow) -> Result<Credential, StoreError> {
    let rounds: i32 = row.try_get("rounds")?;
    Ok(Credential {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        salt: row.try_get("salt")?,
        rounds: u32::try_from(rounds).map_err(decode_err)?,
        password_hash: row.try_get("password_hash")?,
        role: role_from_row(row, "role")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
    })
}

fn token_from_row(row: &PgRow) -> Result<RegistrationToken, StoreError> {
    let created_at: i64 = row.try_get("created_at")?;
    Ok(RegistrationToken {
        id: row.try_get("id")?,
        role: role_from_row(row, "role")?,
        name: row.try_get("name")?,
        notes: row.try_get("notes")?,
        created_at: u64::try_from(created_at).map_err(decode_err)?,
        created_by: row.try_get("created_by")?,
    })
}

const fn role_column(role: Role) -> i16 {
    role.as_u8() as i16
}

pub struct PgRegistration {
    tx: Transaction<'static, Postgres>,
}

impl RegistrationTxn for PgRegistration {
    async fn root_exists(&mut self) -> Result<bool, StoreError> {
        // Held until commit/rollback, so a second bootstrap waits for the
        // first to finish and then sees its root account.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ROOT_BOOTSTRAP_LOCK)
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)")
            .bind(role_column(Role::Root))
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn consume_token(&mut self, id: &str) -> Result<Option<RegistrationToken>, StoreError> {
        let sql = format!(
            "DELETE FROM registration_tokens WHERE id = $1 RETURNING {}",
            TOKEN_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn insert_credential(&mut self, credential: &Credential) -> Result<(), StoreError> {
        let rounds = i32::try_from(credential.rounds).map_err(decode_err)?;
        sqlx::query(
            "INSERT INTO users (id, username, salt, rounds, password_hash, role, name, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&credential.id)
        .bind(&credential.username)
        .bind(&credential.salt)
        .bind(rounds)
        .bind(&credential.password_hash)
        .bind(role_column(credential.role))
        .bind(&credential.name)
        .bind(&credential.email)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Store for PgStore {
    type Registration = PgRegistration;

    async fn begin_registration(&self) -> Result<PgRegistration, StoreError> {
        Ok(PgRegistration {
            tx: self.pool.begin().await?,
        })
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn find_user(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<Credential>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(credential_from_row).collect()
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_user(&self, patch: &UserPatch) -> Result<Option<Credential>, StoreError> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                role = COALESCE($4, role) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&patch.id)
            .bind(patch.name.as_deref())
            .bind(patch.email.as_deref())
            .bind(patch.role.map(role_column))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn list_tokens(&self) -> Result<Vec<RegistrationToken>, StoreError> {
        let sql = format!(
            "SELECT {} FROM registration_tokens ORDER BY created_at",
            TOKEN_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(token_from_row).collect()
    }

    async fn create_token(&self, token: &RegistrationToken) -> Result<(), StoreError> {
        let created_at = i64::try_from(token.created_at).map_err(decode_err)?;
        sqlx::query(
            "INSERT INTO registration_tokens (id, role, name, notes, created_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&token.id)
        .bind(role_column(token.role))
        .bind(&token.name)
        .bind(&token.notes)
        .bind(created_at)
        .bind(&token.created_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_token(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM registration_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
