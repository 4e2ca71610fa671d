mod config;
mod server;

pub use config::{load_config, QlogConfig};

#[cfg(not(test))]
pub async fn serve_default() {
    server::serve(config::load_config()).await;
}

#[cfg(test)]
mod server_tests;
