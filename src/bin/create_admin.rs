use clap::Parser;
use foodgram_api::{
    config::AppConfig,
    db::create_pool,
    middleware::auth::ROLE_ADMIN,
    services::user_service::hash_password,
    validation::{validate_email, validate_password, validate_username},
};
use uuid::Uuid;

/// Create an administrator, or promote the account that already owns the email.
#[derive(Debug, Parser)]
#[command(name = "create_admin")]
struct Args {
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "Admin")]
    first_name: String,
    #[arg(long, default_value = "Admin")]
    last_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    validate_email(&args.email)?;
    validate_username(&args.username)?;
    validate_password(&args.password)?;
    let password_hash = hash_password(&args.password)?;

    let pool = create_pool(&config.database_url).await?;
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&args.email)
    .bind(&args.username)
    .bind(&args.first_name)
    .bind(&args.last_name)
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .fetch_one(&pool)
    .await?;

    println!("Ensured admin {} (id={user_id})", args.email);
    Ok(())
}
