pub mod api;
pub mod artifact;
pub mod config;
pub mod consts;
pub mod gateway;
pub mod query;
pub mod search;
