pub mod cli;
pub mod compiler;
pub mod config;
pub mod convert;
pub mod error;
pub mod link;
pub mod outbound;
pub mod parser;
pub mod render;
pub mod subscription;

pub fn get_version() -> String {
    "0.1.0".to_string()
}
