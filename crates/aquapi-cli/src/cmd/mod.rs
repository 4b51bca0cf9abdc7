pub mod config;
pub mod control;
pub mod decide;
pub mod serve;
