pub mod accounts;
pub mod assistant;
pub mod blob;
pub mod claude_api;
pub mod csv_import;
pub mod database_validator;
pub mod scope;
pub mod sync;
