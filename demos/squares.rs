//! Squares 1..=20 on four workers, skipping multiples of ten.
//!
//! Run with: cargo run --example squares

use bounded_pool::pool::{BoxError, ConfigBuilder, Decision, FailureLog, Pool};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(ConfigBuilder::default().worker_num(4usize).build()?);
    let failures = FailureLog::new();
    let pool = Pool::new(config)?
        .with_filter(|n: &i32| Decision::skip_if(n % 10 == 0))
        .with_error_sink(failures.clone());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let report = pool
        .run(&cancel, 1..=20, |cancel: &CancellationToken, n: &i32| {
            let cancel = cancel.clone();
            let n = *n;
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => return Err::<(), BoxError>("interrupted".into()),
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
                println!("num:{n} square=>{}", n * n);
                Ok(())
            }
        })
        .await?;

    println!(
        "done: {} processed, {} skipped, {} failed",
        report.processed, report.skipped, failures.len()
    );
    Ok(())
}
