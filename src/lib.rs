pub mod app;
pub mod athena;
pub mod aws;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod identity;
pub mod layout;
pub mod output;
pub mod provision;
pub mod schema;
pub mod share;
pub mod storage;
pub mod workspace;
