//! HTTP surface: routes, handlers, HTML pages and error mapping.

mod handlers;
pub mod pages;
pub mod response;
mod routes;

pub use routes::create_router;
