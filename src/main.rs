use std::process::exit;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transitmap::{Config, Presenter, Server, Session};


fn init_logging(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!("transitmap={}", config.log_level))
            })
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    let config = match Config::get() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };
    init_logging(&config);

    info!("syncing with {}", config.api);
    let session = Session::start(&config);
    let server = Server::new(
        session.state(), Presenter::new(config.fit, config.canvas)
    );

    let failed = tokio::select! {
        res = server.run(config.listen) => res.is_err(),
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!("failed to listen for shutdown signal: {}", err);
            }
            false
        }
    };

    info!("shutting down");
    session.shutdown().await;
    if failed {
        exit(1);
    }
}
