pub mod collector;
pub mod history;
pub mod prometheus;
pub mod sample;
