//! 割り込みシグナルの処理

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// SIGINT (Ctrl+C) または SIGTERM でキャンセルされるトークンを作る
///
/// ハンドラはこの関数が戻る前に登録される。tokio ランタイム内で呼ぶこと。
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let interrupt = Interrupt::install();

    tokio::spawn(async move {
        interrupt.recv().await;
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
struct Interrupt {
    sigint: Option<tokio::signal::unix::Signal>,
    sigterm: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl Interrupt {
    fn install() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| warn!("Failed to install SIGINT handler: {}", e))
            .ok();
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| warn!("Failed to install SIGTERM handler: {}", e))
            .ok();
        Self { sigint, sigterm }
    }

    async fn recv(mut self) {
        tokio::select! {
            _ = recv_or_pending(self.sigint.as_mut()) => info!("Received SIGINT (Ctrl+C)"),
            _ = recv_or_pending(self.sigterm.as_mut()) => info!("Received SIGTERM"),
        }
    }
}

#[cfg(unix)]
async fn recv_or_pending(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
struct Interrupt;

#[cfg(not(unix))]
impl Interrupt {
    fn install() -> Self {
        Self
    }

    async fn recv(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
