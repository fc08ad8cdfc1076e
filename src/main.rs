use clap::Parser;
use feedsieve_lib::{run, ServeOptions, StartupError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedsieve=info,feedsieve_lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = ServeOptions::parse();
    if let Err(error) = run(options).await {
        tracing::error!(%error, "feedsieve stopped");
        return Err(error);
    }
    Ok(())
}
