pub mod cache;
pub mod interface;
pub mod kube_scheduler;
pub mod plugin;
pub mod queue;
pub mod recorder;
pub mod scheduler;
