pub mod config;
pub mod cookies;
pub mod error;
pub mod html;
pub mod http;
pub mod invoice;
pub mod notify;
pub mod pace;
pub mod renewal;
pub mod report;
pub mod runner;
pub mod session;
pub mod store;
