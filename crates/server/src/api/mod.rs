pub mod addon;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod search;
pub mod stream;
pub mod torrent;

pub use routes::create_router;
