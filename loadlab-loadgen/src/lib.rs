pub mod audit;
pub mod metrics;
pub mod server;
pub mod worker;
pub mod workload;
