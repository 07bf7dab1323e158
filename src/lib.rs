// Lets the KubeObject derive refer to the crate by name from inside the crate.
extern crate self as cluster_capacity;

pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod report;
pub mod simulator;
pub mod snapshot;
pub mod test_util;
