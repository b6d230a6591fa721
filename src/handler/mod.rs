//! Request handler module
//!
//! Routing dispatch plus the two things a request can be served by:
//! a CGI script or a static file.

pub mod cgi_script;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
