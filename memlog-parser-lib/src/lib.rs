pub mod header;
pub mod memlog_parser;
pub mod utils;
