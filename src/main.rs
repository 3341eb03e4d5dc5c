#![warn(clippy::all)]

use tracing_subscriber::fmt::format::FmtSpan;

use forum::config::Config;

#[tokio::main]
async fn main() -> Result<(), handle_errors::Error> {
    let config = Config::new()?;

    tracing_subscriber::fmt()
        // which traces to record
        .with_env_filter(config.log_level.clone())
        // log an event when each span closes, request spans included
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let store = forum::setup_store(&config).await?;
    forum::run(config, store).await;

    Ok(())
}
