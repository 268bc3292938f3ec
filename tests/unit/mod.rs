pub mod config_tests;
pub mod schema_loader_tests;
pub mod translation_tests;
