// Library exports for the iocman IOC supervisor

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod ipc;
pub mod logs;
pub mod metrics;
pub mod process;
