pub mod db;
pub mod draft;
pub mod interaction;
pub mod review;
pub mod types;
