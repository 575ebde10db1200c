use crate::{MessageBridge, PublishSink};
use async_trait::async_trait;
use metrics::counter;
use pulse_types::message::Message;
use tracing::debug;

/// 直通中继：窗口聚合器的零窗口退化形态
///
/// 没有缓冲也没有定时器，每条入站消息做前缀变换后立即转发。
pub struct PassthroughRelay<S: PublishSink> {
    prefix: String,
    sink: S,
}

impl<S: PublishSink> PassthroughRelay<S> {
    pub fn new(sink: S, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }

    /// 变换并同步转发一条入站负载
    pub async fn ingest(&self, raw: &str) {
        let outgoing = format!("{}{}", self.prefix, raw);
        counter!("pulse_messages_relayed_total", 1);
        if let Err(e) = self.sink.publish(outgoing).await {
            debug!(error = %e, "Relay publish failed");
        }
    }
}

#[async_trait]
impl<S: PublishSink> MessageBridge for PassthroughRelay<S> {
    async fn ingest(&self, msg: &Message) {
        self.ingest(msg.payload.as_str()).await;
    }
}
