//! API Module
//!
//! HTTP handlers and routing for the cache management REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /caches` - List cache names
//! - `/caches/:name/entries[/:key]` - Entry reads, writes and removals
//! - `/caches/:name/parameters` - Live cache limits
//! - `POST /caches/:name/sweep` - Run the expiry sweep
//! - `GET /caches/:name/stats` - Get cache statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
