//! Configuration store and its registries.

pub mod configuration;
pub mod mappers;
pub mod statements;

pub use configuration::{Configuration, ConfigurationBuilder};
pub use mappers::{MapperRegistry, MapperType};
pub use statements::StatementRegistry;
