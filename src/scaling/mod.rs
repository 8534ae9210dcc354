pub mod container_runtime;
pub mod controller;
pub mod decision;
pub mod poller;
pub mod scaling_config;
pub mod scaling_error;

pub(crate) mod test_controller;
