use parley::api;
use parley::logger::*;
use parley::server::*;
use parley::settings::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use warp::Filter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let settings = parse_settings(cli.settings.as_deref())?;
    info!(port = settings.port, env = ?settings.node_env, "configuration loaded");
    let logger_config = LogConfig {
        filter: settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let address = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    let server = Arc::new(Server::try_new(&settings).await?);

    let routes = api::routes(server.clone()).recover(api::recover_error);

    warp::serve(routes)
        .bind_with_graceful_shutdown(address, async {
            signal::ctrl_c().await.expect("Could not register SIGINT");
        })
        .1
        .await;

    // Sockets get a 1001 close, then in-flight store work drains; the
    // deadline is hard and the process exits regardless.
    let shutdown_timeout = Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => tracing::info!("server shutdown successfully"),
        Err(_) => tracing::error!("server shutdown timed out"),
    }

    Ok(())
}
