pub mod app;
pub mod build;
pub mod build_log;
