use async_trait::async_trait;
use pulse_core::session::Publisher;
use pulse_core::Result;
use std::sync::Arc;

/// 出站发布汇
///
/// 桥接逻辑只依赖这个接口，具体投递语义由基座决定。
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, payload: String) -> Result<()>;
}

#[async_trait]
impl PublishSink for Publisher {
    async fn publish(&self, payload: String) -> Result<()> {
        self.put(payload).map(|_| ())
    }
}

#[async_trait]
impl<T: PublishSink + ?Sized> PublishSink for Arc<T> {
    async fn publish(&self, payload: String) -> Result<()> {
        (**self).publish(payload).await
    }
}
