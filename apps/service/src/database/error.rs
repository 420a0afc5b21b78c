use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    QueryFailure(#[from] libsql::Error),

    #[error("Could not get a database connection: {0}")]
    Pool(#[from] deadpool::managed::PoolError<libsql::Error>),

    #[error("Could not build the connection pool: {0}")]
    PoolBuild(#[from] deadpool::managed::BuildError),

    #[error("Record not found")]
    NotFound,

    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("Invalid record: {0}")]
    Invalid(String),
}

impl DatabaseError {
    pub(crate) fn corrupt(table: &'static str, reason: impl ToString) -> Self {
        Self::Corrupt { table, reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

