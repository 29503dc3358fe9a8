use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Public origin used to build absolute media and short-link URLs.
    pub base_url: String,
    pub media_root: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string());
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            jwt_ttl_hours,
            base_url,
            media_root,
        })
    }

    /// Absolute URL for a path stored relative to `MEDIA_ROOT`.
    pub fn media_url(&self, relative: &str) -> String {
        format!("{}/media/{}", self.base_url, relative.trim_start_matches('/'))
    }

    pub fn short_link_url(&self, code: &str) -> String {
        format!("{}/s/{}", self.base_url, code)
    }

    pub fn recipe_page_url(&self, recipe_id: uuid::Uuid) -> String {
        format!("{}/recipes/{}", self.base_url, recipe_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/foodgram".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "secret".into(),
            jwt_ttl_hours: 24,
            base_url: "https://foodgram.example".into(),
            media_root: "media".into(),
        }
    }

    #[test]
    fn builds_absolute_urls() {
        let cfg = config();
        assert_eq!(
            cfg.media_url("/recipes/images/a.png"),
            "https://foodgram.example/media/recipes/images/a.png"
        );
        assert_eq!(cfg.short_link_url("aB3xY9"), "https://foodgram.example/s/aB3xY9");
    }
}
