pub mod config_cmd;
pub mod knowledge;
pub mod research;
