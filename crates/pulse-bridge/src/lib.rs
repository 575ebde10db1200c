pub mod aggregator;
pub mod relay;
pub mod sink;

pub use aggregator::WindowedAggregator;
pub use relay::PassthroughRelay;
pub use sink::PublishSink;

use async_trait::async_trait;
use pulse_types::message::Message;

/// 入站消息到出站消息的桥接契约
///
/// 窗口聚合器（缓冲 + 定时）与直通中继（零窗口）共享同一入口，
/// 出站发布与具体的入站消息解耦。
#[async_trait]
pub trait MessageBridge: Send + Sync {
    async fn ingest(&self, msg: &Message);
}
