pub mod api;
pub mod domain;
pub mod domain_model;
pub mod domain_port;
pub mod infra_mysql;
pub mod logger;
pub mod server;
pub mod settings;
