//! In-memory generation backend speaking the same HTTP contract the tracker
//! polls. Used by `gs-app serve` and by the end-to-end tests.

mod routes;
mod state;

pub use state::{SimulatedJobs, SimulationConfig};

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::server::routes::api_routes;

pub fn router(state: Arc<SimulatedJobs>) -> Router {
    Router::new().merge(api_routes()).with_state(state)
}

/// Serve the simulated backend on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    config: SimulationConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let app = router(Arc::new(SimulatedJobs::new(config)));

    info!(%addr, step = config.progress_step, "Simulated backend listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
