pub mod error;
pub mod fingerprint;
pub mod flow;
pub mod mapping;
pub mod plan;
pub mod ports;
pub mod repo;
pub mod value_objects;
