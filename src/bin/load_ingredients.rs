use std::path::PathBuf;

use clap::Parser;
use foodgram_api::{config::AppConfig, db::create_pool};
use serde::Deserialize;

/// Import the ingredient catalog from a JSON file.
#[derive(Debug, Parser)]
#[command(
    name = "load_ingredients",
    about = "Insert ingredients from a JSON array, skipping pairs that already exist"
)]
struct Args {
    /// JSON array of `{"name", "measurement_unit"}` objects.
    #[arg(value_name = "PATH", default_value = "data/ingredients.json")]
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct IngredientRecord {
    name: String,
    measurement_unit: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    if !args.path.exists() {
        anyhow::bail!("file not found: {}", args.path.display());
    }
    println!("Loading ingredients from {}...", args.path.display());

    let raw = tokio::fs::read_to_string(&args.path).await?;
    let records: Vec<IngredientRecord> = serde_json::from_str(&raw)?;

    let pool = create_pool(&config.database_url).await?;
    let mut created = 0u64;
    let mut skipped = 0u64;

    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(record.name.trim())
        .bind(record.measurement_unit.trim())
        .execute(&pool)
        .await?;

        if result.rows_affected() == 1 {
            created += 1;
        } else {
            skipped += 1;
        }
    }

    println!("Import finished. Created: {created}, skipped (already present): {skipped}");
    Ok(())
}
