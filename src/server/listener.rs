use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::LaunchConfig;
use crate::http::connection::Connection;
use crate::http::handler::Handler;
use crate::session::ClientSideSessionCodec;

pub async fn run(launch: Arc<LaunchConfig>, handler: Arc<dyn Handler>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&launch.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    serve(listener, launch, handler).await
}

/// Accepts connections on an already bound listener until accepting fails.
pub async fn serve(
    listener: TcpListener,
    launch: Arc<LaunchConfig>,
    handler: Arc<dyn Handler>,
) -> anyhow::Result<()> {
    let codec = Arc::new(ClientSideSessionCodec::new(launch.session.clone()));

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let launch = launch.clone();
        let codec = codec.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, launch, codec, handler);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
