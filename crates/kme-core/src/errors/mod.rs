pub mod domain;
pub mod error_code;
