pub mod admin;
pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod products;
pub mod profile;
pub mod reports;
