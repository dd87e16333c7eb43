pub mod append_use_case;
pub mod log_use_case;
pub mod ports;
