//! In-process compile server bound to an ephemeral port

use cforge_common::AppConfig;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running server plus the handle to stop it
pub struct TestServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(config: &AppConfig) -> Self {
        let state = cforge_server::build_state(config).expect("Failed to build server state");
        let listener = tokio::net::TcpListener::bind(&config.server.bind)
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            cforge_server::start_server(listener, state, async {
                let _ = rx.await;
            })
            .await
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Trigger graceful shutdown and wait for the server task
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await?
    }
}
