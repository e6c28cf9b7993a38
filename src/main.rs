use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tether::config::LaunchConfig;
use tether::http::handler::Exchange;
use tether::http::status::Status;
use tether::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let launch = Arc::new(LaunchConfig::load()?);
    tracing::info!(
        base_dir = %launch.base_dir().display(),
        reloadable = launch.is_reloadable(),
        "Configuration loaded"
    );

    tokio::select! {
        res = server::listener::run(launch, Arc::new(route)) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Visits {
    count: u64,
}

async fn route(ex: Exchange) -> anyhow::Result<()> {
    let Exchange {
        request,
        mut response,
        session,
    } = ex;

    match request.path_only() {
        "/" => {
            let mut visits = session.get_typed::<Visits>().await?.unwrap_or_default();
            visits.count += 1;
            let count = visits.count;
            session.set_typed(visits).await?;

            let name = session.get("name").await?.unwrap_or_else(|| "stranger".into());
            response
                .send_text(&format!("Hello {}, visit number {}\n", name, count))
                .await?;
        }
        "/name" => match request.query_param("value") {
            Some(name) => {
                session.set("name", name).await?;
                response.status(Status::SEE_OTHER);
                response.headers_mut().set("Location", "/");
                response.send().await?;
            }
            None => {
                response.status(Status::BAD_REQUEST);
                response.send_text("missing value\n").await?;
            }
        },
        "/logout" => {
            session.terminate().await?;
            response.send_text("Session ended\n").await?;
        }
        "/file" => {
            let file = response.launch().other("demo_file", "index.html").to_string();
            response.send_file(file).await?;
        }
        "/stream" => {
            let chunks = ["first\n", "second\n", "third\n"].map(Bytes::from);
            response.send_stream(futures_util::stream::iter(chunks)).await?;
        }
        _ => {
            response.status(Status::NOT_FOUND);
            response.send_text("Not Found\n").await?;
        }
    }

    Ok(())
}
