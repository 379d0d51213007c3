//! Signal handling for graceful shutdown

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Resolve once Ctrl+C (or SIGTERM on Unix) arrives
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    #[cfg(unix)]
    let sigterm = {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;

        let flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGTERM, flag.clone())?;
        flag
    };

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = async {
            use std::sync::atomic::Ordering;

            while !sigterm.load(Ordering::Relaxed) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();
        tokio::pin!(terminated);

        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Ctrl+C signal received"),
                Err(e) => {
                    error!("Failed to listen for Ctrl+C signal: {}", e);
                    (&mut terminated).await;
                    info!("SIGTERM signal received");
                }
            },
            _ = &mut terminated => info!("SIGTERM signal received"),
        }

        let _ = shutdown_tx.send(());
    });

    Ok(shutdown_rx)
}
