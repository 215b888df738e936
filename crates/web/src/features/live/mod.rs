pub mod broadcaster;
pub mod handlers;
pub mod routes;
