use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
    #[error(transparent)]
    DotEnvError(#[from] dotenvy::Error),
}

/// Active blob backend plus its connection parameters. Selected exactly
/// once at load time; nothing downstream branches on the deployment
/// environment again.
#[derive(Clone, Debug)]
pub enum StorageConfig {
    Local {
        media_root: PathBuf,
    },
    Azure {
        account: String,
        access_key: String,
        container: String,
    },
}

#[derive(Clone, Debug)] // Clone needed if passed around, Debug for logging
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_path: PathBuf,
    pub storage: StorageConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// The Azure backend is selected only when the full credential set is
    /// present AND `APP_ENV=production`; everything else runs on local
    /// disk. Mirrors how the deployment has always picked its backend.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        let bind_address_str = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let database_path =
            PathBuf::from(env::var("DATABASE_PATH").unwrap_or_else(|_| "catalog.db".to_string()));

        let is_production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let azure = match (
            env::var("AZURE_STORAGE_ACCOUNT"),
            env::var("AZURE_STORAGE_ACCESS_KEY"),
            env::var("AZURE_STORAGE_CONTAINER"),
        ) {
            (Ok(account), Ok(access_key), Ok(container)) => Some(StorageConfig::Azure {
                account,
                access_key,
                container,
            }),
            _ => None,
        };

        let storage = match azure {
            Some(azure) if is_production => azure,
            _ => StorageConfig::Local {
                media_root: PathBuf::from(
                    env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
                ),
            },
        };

        Ok(Config {
            bind_address,
            database_path,
            storage,
        })
    }
}
