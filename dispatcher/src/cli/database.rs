use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseBackend {
    Mongodb,
    /// Process-local store, lost on restart
    Memory,
}

/// Parameters used to config the job store.
#[derive(Debug, Clone, Args)]
pub struct DatabaseCliArgs {
    /// Where job records are kept.
    #[arg(env = "DISPATCHER_DATABASE_BACKEND", long, value_enum, default_value = "mongodb")]
    pub database_backend: DatabaseBackend,

    /// The connection string to the MongoDB server.
    #[arg(env = "DISPATCHER_MONGODB_CONNECTION_URL", long, default_value = "mongodb://localhost:27017")]
    pub mongodb_connection_url: String,

    /// The name of the database.
    #[arg(env = "DISPATCHER_DATABASE_NAME", long, default_value = "dispatcher")]
    pub mongodb_database_name: String,
}
