//! HTTP and WebSocket surface for market data
//!
//! - `GET /api/indices/:symbol`, `/api/stock/:symbol`, `/api/crypto/:coin_id`
//! - `GET /api/news`
//! - `POST /api/indicators`
//! - `GET /ws` (live broadcast subscription)
//! - `GET /health`

pub mod handlers;
pub mod models;
pub mod routes;
pub mod ws;

pub use handlers::ApiState;
pub use routes::create_router;
pub use ws::WebSocketSubscriber;
