mod error;
mod store;

pub use error::SqliteDaoError;
pub use store::{SqliteConnector, SqliteRecordEngine};
