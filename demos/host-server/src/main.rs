//! Runs a Casefile server configured from the environment.
//!
//! ```text
//! CASEFILE_BIND=0.0.0.0:8080 CASEFILE_DATABASE=casefile.db \
//!     cargo run -p casefile-host-server
//! ```
//!
//! `RUST_LOG` overrides the default log filter.

use casefile::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CasefileError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,casefile=debug")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        database = ?config.database,
        total_clues = config.rules.total_clues,
        "starting casefile"
    );

    let server = CasefileServerBuilder::with_config(config).build().await?;
    println!("Casefile server listening on {}", server.local_addr()?);
    server.run().await
}
