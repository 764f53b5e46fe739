//! `PostgreSQL` implementations of the storage traits.

pub mod appeal;
pub mod directory;

pub use appeal::AppealRepository;
pub use directory::DirectoryRepository;
