pub mod accounts;
pub mod actions;
pub mod audit;
pub mod health;
pub mod resources;
