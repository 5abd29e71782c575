//! Process configuration read from the environment (after `.env` is loaded).

use crate::error::ConfigError;

pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key-change-in-production";
pub const DEFAULT_THEME: &str = "cerulean";
pub const DEFAULT_TITLE: &str = "Admin - Auto Discovery";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_PORT: u16 = 5000;

/// Bootswatch themes the admin templates can link to.
const THEMES: &[&str] = &[
    "cerulean", "cosmo", "cyborg", "darkly", "flatly", "journal", "litera", "lumen", "lux",
    "materia", "minty", "pulse", "sandstone", "simplex", "sketchy", "slate", "solar",
    "spacelab", "superhero", "united", "yeti",
];

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub database_url: String,
    /// Signs the CSRF tokens embedded in mutating forms.
    pub secret_key: String,
    pub theme: String,
    pub title: String,
    /// Schema whose tables are introspected.
    pub schema: String,
    pub max_connections: u32,
    pub port: u16,
}

impl AdminConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build config from any variable lookup. `SQLALCHEMY_DATABASE_URI` wins over `DATABASE_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("SQLALCHEMY_DATABASE_URI")
            .or_else(|| get("DATABASE_URL"))
            .map(|u| normalize_database_url(&u))
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let secret_key = match get("SECRET_KEY") {
            Some(s) => s,
            None => {
                tracing::warn!("SECRET_KEY not set, using the development default");
                DEFAULT_SECRET_KEY.to_string()
            }
        };

        let theme = get("ADMIN_THEME")
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| DEFAULT_THEME.into());
        if !THEMES.contains(&theme.as_str()) {
            return Err(ConfigError::Invalid {
                name: "ADMIN_THEME",
                message: format!("unknown theme '{}'", theme),
            });
        }

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "DB_MAX_CONNECTIONS",
                    message: format!("'{}' is not a positive integer", v),
                })?,
            None => 5,
        };
        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                message: format!("'{}' is not a port number", v),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(AdminConfig {
            database_url,
            secret_key,
            theme,
            title: get("ADMIN_TITLE").unwrap_or_else(|| DEFAULT_TITLE.into()),
            schema: get("ADMIN_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.into()),
            max_connections,
            port,
        })
    }
}

/// Heroku/Render style `postgres://` urls become `postgresql://`.
pub fn normalize_database_url(url: &str) -> String {
    match url.strip_prefix("postgres://") {
        Some(rest) => format!("postgresql://{}", rest),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn primary_url_variable_wins() {
        let cfg = AdminConfig::from_lookup(lookup(&[
            ("SQLALCHEMY_DATABASE_URI", "postgresql://a/one"),
            ("DATABASE_URL", "postgresql://b/two"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url, "postgresql://a/one");
    }

    #[test]
    fn falls_back_to_database_url_and_normalizes() {
        let cfg = AdminConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://u:p@h/db")])).unwrap();
        assert_eq!(cfg.database_url, "postgresql://u:p@h/db");
        assert_eq!(cfg.secret_key, DEFAULT_SECRET_KEY);
        assert_eq!(cfg.theme, "cerulean");
        assert_eq!(cfg.schema, "public");
        assert_eq!(cfg.port, 5000);
    }

    #[test]
    fn missing_url_is_an_error() {
        let err = AdminConfig::from_lookup(lookup(&[("SECRET_KEY", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn blank_url_counts_as_missing() {
        let err = AdminConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDatabaseUrl));
    }

    #[test]
    fn rejects_unknown_theme() {
        let err = AdminConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://h/db"),
            ("ADMIN_THEME", "neon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "ADMIN_THEME", .. }));
    }

    #[test]
    fn rejects_bad_port() {
        let err = AdminConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://h/db"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn pool_size_must_be_positive() {
        for bad in ["0", "-2", "many"] {
            let err = AdminConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgresql://h/db"),
                ("DB_MAX_CONNECTIONS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", .. }), "{}", bad);
        }
        let cfg = AdminConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://h/db"),
            ("DB_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(cfg.max_connections, 12);
    }

    #[test]
    fn other_schemes_untouched() {
        assert_eq!(normalize_database_url("postgresql://x"), "postgresql://x");
        assert_eq!(normalize_database_url("sqlite://x"), "sqlite://x");
    }
}
