pub mod cap_table;
pub mod exit_values;
pub mod file;
pub mod stdin;
