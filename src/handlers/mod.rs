pub mod status_handler;
