mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod postgres;
    pub mod schema;
    pub mod store;
    pub mod views;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod config;
mod constants;

pub use authentication::*;
pub use constants::*;
pub use database::*;
