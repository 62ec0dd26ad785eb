//! Connection settings and the client handle scripts run against

use bson::doc;
use curator_common::{CuratorError, Result};
use mongodb::{
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Database,
};

use crate::mongo_store::MongoStore;
use crate::validation::validate_database_name;

/// Database used when `MONGODB_DB` is not set
pub const DEFAULT_DATABASE: &str = "brunan";

const DEFAULT_APP_NAME: &str = "curator";

/// Where to connect and which database to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection string, e.g. `mongodb://localhost:27017`
    pub uri: String,
    pub database: String,
    /// Application name reported in server logs
    pub app_name: String,
}

impl ConnectionConfig {
    /// Create from environment variables.
    ///
    /// Reads MONGODB_URI (required), MONGODB_DB and MONGODB_APP_NAME.
    pub fn from_env() -> Result<Self> {
        let uri = std::env::var("MONGODB_URI").map_err(|_| {
            CuratorError::Config(
                "MONGODB_URI is required (e.g. mongodb://localhost:27017)".to_string(),
            )
        })?;

        let database =
            std::env::var("MONGODB_DB").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());

        let app_name =
            std::env::var("MONGODB_APP_NAME").unwrap_or_else(|_| DEFAULT_APP_NAME.to_string());

        Ok(Self {
            uri,
            database,
            app_name,
        })
    }

    /// Create with explicit values.
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            app_name: DEFAULT_APP_NAME.to_string(),
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }
}

/// A connected client, scoped to the database commands go to
pub struct Connection {
    database: Database,
}

impl Connection {
    /// Connect and verify the server answers a ping
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        validate_database_name(&config.database)?;

        let mut client_options = ClientOptions::parse(&config.uri).await?;
        client_options.app_name = Some(config.app_name.clone());

        // Set stable API version for compatibility
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)?;
        let database = client.database(&config.database);

        let connection = Self { database };
        connection.ping().await?;
        Ok(connection)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Store issuing commands against the configured database
    pub fn store(&self) -> MongoStore {
        MongoStore::new(self.database.clone())
    }

    /// Check the connection by pinging the server
    pub async fn ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CuratorError::Connection(format!("Ping failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_app_name() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "brunan");
        assert_eq!(config.database, "brunan");
        assert_eq!(config.app_name, "curator");
    }

    #[test]
    fn test_overrides() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", DEFAULT_DATABASE)
            .database("name")
            .uri("mongodb://db:27017");
        assert_eq!(config.database, "name");
        assert_eq!(config.uri, "mongodb://db:27017");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_database_name() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "bad.name");
        let err = Connection::connect(&config).await.err().unwrap();
        assert!(matches!(err, CuratorError::Validation(_)));
    }

    #[tokio::test]
    #[ignore] // Only run with --ignored flag when a server is available
    async fn test_connect_and_ping() {
        let uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let conn = Connection::connect(&ConnectionConfig::new(uri, "curator_test"))
            .await
            .unwrap();
        conn.ping().await.unwrap();
    }
}
