use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use ekv_engine::MemoryEngine;
use ekv_server::{ServerState, bind_listener, serve};

/// Running server on an ephemeral port. Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

pub async fn spawn_test_server() -> std::io::Result<TestServer> {
    let listener = bind_listener("127.0.0.1:0".parse().map_err(std::io::Error::other)?)?;
    let addr = listener.local_addr()?;

    let engine = Arc::new(MemoryEngine::new());
    let expirer = engine.start_expirer(Duration::from_millis(50));
    let state = Arc::new(ServerState::new(engine));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = serve(listener, state, async {
            let _ = shutdown_rx.await;
        })
        .await;
        expirer.stop();
    });

    Ok(TestServer {
        addr,
        _shutdown: shutdown_tx,
    })
}
