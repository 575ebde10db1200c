use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - 优雅关闭
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 信号处理器：把进程级信号扇出给所有订阅者
///
/// 取消是正常的终止路径，不是错误。收到信号后各组件
/// 停止接纳新的摄入与触发，已持有的锁区段执行完即退出。
pub struct SignalHandler {
    tx: broadcast::Sender<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.tx.subscribe()
    }

    /// 手动触发关闭
    pub fn trigger(&self, signal: ShutdownSignal) {
        info!(signal = ?signal, "Shutdown triggered");
        let _ = self.tx.send(signal);
    }

    /// 等待系统信号（SIGTERM / SIGINT），收到后广播并返回
    #[cfg(unix)]
    pub async fn listen(&self) -> ShutdownSignal {
        use signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        let received = tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
        };

        let _ = self.tx.send(received);
        received
    }

    /// 等待系统信号（Windows 版本）
    #[cfg(not(unix))]
    pub async fn listen(&self) -> ShutdownSignal {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C");
        let _ = self.tx.send(ShutdownSignal::Interrupt);
        ShutdownSignal::Interrupt
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
