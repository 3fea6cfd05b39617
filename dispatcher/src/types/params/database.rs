use crate::cli::database::{DatabaseBackend, DatabaseCliArgs};
use crate::DispatcherError;

#[derive(Debug, Clone)]
pub struct MongoDbParams {
    pub connection_uri: String,
    pub database_name: String,
}

#[derive(Debug, Clone)]
pub enum DatabaseParams {
    MongoDb(MongoDbParams),
    Memory,
}

impl TryFrom<DatabaseCliArgs> for DatabaseParams {
    type Error = DispatcherError;

    fn try_from(args: DatabaseCliArgs) -> Result<Self, Self::Error> {
        match args.database_backend {
            DatabaseBackend::Memory => Ok(Self::Memory),
            DatabaseBackend::Mongodb => {
                if args.mongodb_database_name.trim().is_empty() {
                    return Err(DispatcherError::ConfigError("MongoDB database name is required".to_string()));
                }
                Ok(Self::MongoDb(MongoDbParams {
                    connection_uri: args.mongodb_connection_url,
                    database_name: args.mongodb_database_name,
                }))
            }
        }
    }
}
