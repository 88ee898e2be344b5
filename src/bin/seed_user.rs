// Create a login in the Postgres store.
//
// Usage: seed_user <email> <password> [name] [role] [tenant_id]
// Reads DATABASE_URL (a .env file is honoured).

use anyhow::{Context, anyhow};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let usage = "Usage: seed_user <email> <password> [name] [role] [tenant_id]";
    let email = args.next().context(usage)?.trim().to_lowercase();
    let password = args.next().context(usage)?;
    let name = args.next().unwrap_or_else(|| "Admin".to_string());
    let role = args.next().unwrap_or_else(|| "admin".to_string());
    let tenant_id = args
        .next()
        .map(|s| s.parse::<i64>().context("tenant_id must be an integer"))
        .transpose()?;

    if password.len() < 8 {
        return Err(anyhow!("password must be at least 8 characters"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("argon2 hash error: {e}"))?
        .to_string();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO app_user (name, email, password_hash, role, tenant_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (lower(email)) DO UPDATE
            SET name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                role = EXCLUDED.role,
                tenant_id = EXCLUDED.tenant_id
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&phc)
    .bind(&role)
    .bind(tenant_id)
    .fetch_one(&pool)
    .await?;

    println!("user {id} <{email}> role={role}");
    Ok(())
}
