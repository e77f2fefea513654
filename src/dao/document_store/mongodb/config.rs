//! Connection settings for the MongoDB backend.

use std::{env, time::Duration};

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "poker_clock";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
const APP_NAME: &str = "poker-clock-back";
const FIRST_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
    /// Pings attempted before a connection is given up.
    pub connect_attempts: u32,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self {
            options,
            database_name: db_name.unwrap_or(DEFAULT_DATABASE).to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    /// Read `MONGO_URI`, `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS`, all optional.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = env::var("MONGO_URI").unwrap_or_else(|_| DEFAULT_URI.into());
        let db = env::var("MONGO_DB").ok();
        let config = Self::from_uri(&uri, db.as_deref()).await?;

        let attempts = env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse().ok());
        Ok(match attempts {
            Some(attempts) => config.with_connect_attempts(attempts),
            None => config,
        })
    }

    /// Build a client and ping the database until it answers or the attempts
    /// run out.
    pub(super) async fn connect(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut attempts = 0;
        let mut delay = FIRST_PING_DELAY;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok((client, database)),
                Err(err) => {
                    attempts += 1;
                    if attempts >= self.connect_attempts {
                        return Err(MongoDaoError::InitialPing {
                            attempts,
                            source: err,
                        });
                    }
                    debug!(
                        attempts,
                        database = %self.database_name,
                        error = %err,
                        "MongoDB ping failed; retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_PING_DELAY);
                }
            }
        }
    }
}
