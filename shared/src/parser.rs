//! Parsers for values read from the command line and the config file.

pub mod interval;
pub mod quota_size;
