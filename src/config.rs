use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageMode {
    /// MongoDB when a URI is configured, memory otherwise.
    Auto,
    Memory,
    Mongo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Mongo { uri: String, database: String },
}

#[derive(Debug, Parser)]
#[command(name = "splitsmart", version, about = "Shared expense ledger API")]
pub struct Config {
    /// Socket address to bind, e.g. 0.0.0.0:5001
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5001")]
    pub bind: String,

    #[arg(long, value_enum, env = "STORAGE_MODE", default_value_t = StorageMode::Auto)]
    pub storage: StorageMode,

    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    #[arg(long, env = "MONGODB_DATABASE", default_value = "SplitSmart")]
    pub database: String,

    /// Extra CORS origin, may be repeated.
    #[arg(long = "allowed-origin", env = "FRONTEND_URL", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    pub fn storage(&self) -> anyhow::Result<StorageConfig> {
        let mongo = |uri: String| StorageConfig::Mongo {
            uri,
            database: self.database.clone(),
        };
        match self.storage {
            StorageMode::Memory => Ok(StorageConfig::Memory),
            StorageMode::Mongo => {
                let uri = self
                    .mongodb_uri
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--storage mongo requires --mongodb-uri or MONGODB_URI"))?;
                Ok(mongo(uri))
            }
            StorageMode::Auto => Ok(self.mongodb_uri.clone().map_or(StorageConfig::Memory, mongo)),
        }
    }

    /// Configured origins plus the local development frontends, without
    /// trailing slashes.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        for local in ["http://localhost:3000", "http://localhost:3001"] {
            if !origins.iter().any(|o| o == local) {
                origins.push(local.to_string());
            }
        }
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("splitsmart").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn auto_storage_without_uri_is_memory() {
        let config = parse(&["--storage", "auto"]);
        assert_eq!(config.storage().unwrap(), StorageConfig::Memory);
    }

    #[test]
    fn auto_storage_with_uri_is_mongo() {
        let config = parse(&["--mongodb-uri", "mongodb://db:27017", "--database", "Trips"]);
        assert_eq!(
            config.storage().unwrap(),
            StorageConfig::Mongo {
                uri: "mongodb://db:27017".into(),
                database: "Trips".into(),
            }
        );
    }

    #[test]
    fn mongo_storage_requires_uri() {
        let config = parse(&["--storage", "mongo"]);
        assert!(config.storage().is_err());
    }

    #[test]
    fn cors_origins_are_normalized() {
        let config = parse(&["--allowed-origin", "https://split.example.com/,http://localhost:3000"]);
        assert_eq!(
            config.cors_origins(),
            vec![
                "https://split.example.com".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ]
        );
    }
}
