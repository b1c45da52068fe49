pub mod diff;
pub mod locks;
pub mod pull;
pub mod push;
pub mod repos;
