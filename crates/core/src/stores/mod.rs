pub mod pinecone;
pub mod sqlite;

pub use pinecone::PineconeStore;
pub use sqlite::Database;
