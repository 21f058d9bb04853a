//! Example that watches a blob and prints every change.
//!
//! ```text
//! VITESET_BLOB=feature-flags VITESET_SECRET=... cargo run --example watch_blob
//! ```
//!
//! Set `RUST_LOG=viteset_client=debug` to see each poll.

use viteset_client::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "viteset_client=info".into()),
        )
        .init();

    let config = ClientConfig::from_env("VITESET")?;
    let mut client = Client::new(config);
    let mut updates = client.subscribe()?;

    println!("Watching {} (Ctrl-C to stop)", client.config().url());

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(Update::Value(value)) => {
                    println!("Update: {}", String::from_utf8_lossy(&value));
                }
                // Keep the last value; the next poll will most likely succeed.
                Some(Update::Error(err)) => eprintln!("Poll failed: {}", err),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.cancel();
    Ok(())
}
