pub mod application;
pub mod prune;
pub mod register;
pub mod responses;
