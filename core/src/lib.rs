pub mod error;
pub mod food_store;
pub mod grid;
pub mod models;
pub mod modes;
pub mod nutrients;
pub mod plan_store;
pub mod recalc;
pub mod session;
