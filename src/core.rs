pub mod cluster_client;
pub mod common;
pub mod events;
pub mod node;
pub mod object;
pub mod objects;
pub mod pod;
pub mod resource_store;
pub mod rest_client;
pub mod scheduler;
