pub mod api;
pub mod composition;
pub mod detail;
pub mod download;
pub mod fundamentals;
pub mod htmltable;
pub mod listing;
pub mod models;
pub mod ui;
pub mod utils;
