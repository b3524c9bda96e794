pub mod application;
pub mod commands;
pub mod fetcher;
pub mod http;
pub mod lock;
pub mod prompt;
pub mod provider;
pub mod recipe;
pub mod registry;
pub mod runtime;
pub mod tools;
pub mod version;
