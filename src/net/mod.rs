mod handlers;
mod models;
mod router;
mod state;
mod ws;

pub use router::router;
pub use state::AppState;
