use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("QLOG_LOG")
        .unwrap_or_else(|_| EnvFilter::new("qlogd=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    qlogd::serve_default().await;
}
