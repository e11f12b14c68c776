// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OS signal handling for long-running commands.

use tracing::info;

use crate::error::BinResult;

/// Resolves on SIGINT, SIGTERM or SIGQUIT (Ctrl+C elsewhere).
pub async fn shutdown_signal() -> BinResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigquit = signal(SignalKind::quit())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigquit.recv() => info!("Received SIGQUIT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

/// Runs `future` until it finishes or a shutdown signal arrives.
///
/// Returns `None` when interrupted.
pub async fn run_until_signal<F, T>(future: F) -> BinResult<Option<T>>
where
    F: std::future::Future<Output = T>,
{
    tokio::select! {
        output = future => Ok(Some(output)),
        signal = shutdown_signal() => signal.map(|()| None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_until_signal_completes() {
        let output = run_until_signal(async { 7 }).await.unwrap();
        assert_eq!(output, Some(7));
    }
}
