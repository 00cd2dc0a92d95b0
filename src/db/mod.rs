pub mod artist;
pub mod core;

pub use self::artist::SqlArtistStore;
pub use self::core::Database;
