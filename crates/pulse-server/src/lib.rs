// 配置与指标模块，导出供集成测试使用
pub mod config;
pub mod metrics;

use pulse_bridge::MessageBridge;
use pulse_core::session::Subscriber;
use pulse_shutdown::ShutdownSignal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

// 重新导出配置类型
pub use config::AppConfig;

/// 订阅转发循环：把入站消息逐条交给桥接组件
///
/// 会话关闭或收到关闭信号后结束，之后不再接纳新的摄入。
pub async fn forward(
    mut subscriber: Subscriber,
    bridge: Arc<dyn MessageBridge>,
    mut shutdown: broadcast::Receiver<ShutdownSignal>,
) {
    loop {
        tokio::select! {
            msg = subscriber.recv() => match msg {
                Some(msg) => {
                    debug!(topic = %msg.topic, "Inbound message");
                    bridge.ingest(&msg).await;
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    info!(topic = %subscriber.topic(), "Forward loop ended");
}
