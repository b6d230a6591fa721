//! HTTP protocol layer module
//!
//! Path handling, validators, MIME types and response builders shared by the
//! static file and CGI handlers.

pub mod cache;
pub mod mime;
pub mod path;
pub mod response;

// Re-export commonly used items
pub use path::{collapse_path, translate_path};
pub use response::{
    build_301_response, build_304_response, build_403_response, build_404_response,
    build_413_response, build_500_response, build_501_response,
};
