pub mod cli_main;
pub mod natives;
