use crate::{MessageBridge, PublishSink};
use async_trait::async_trait;
use metrics::counter;
use pulse_core::Result;
use pulse_shutdown::ShutdownSignal;
use pulse_types::message::Message;
use pulse_types::summary::WindowSummary;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 窗口聚合器
///
/// 订阅路径异步推入数值采样，定时器按固定周期翻转窗口：
/// 原子地读取并清空缓冲，发布 {数量, 均值} 汇总。
/// 追加与排空经过同一把锁，单个采样要么完整落入恰好一个
/// 窗口，要么被丢弃，绝不拆分或重复计数。
pub struct WindowedAggregator<S: PublishSink> {
    buffer: Mutex<Vec<f64>>,
    sink: S,
}

impl<S: PublishSink> WindowedAggregator<S> {
    pub fn new(sink: S) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// 把整个负载文本解析为一个数值采样
    fn parse_sample(raw: &str) -> Result<f64> {
        Ok(raw.trim().parse::<f64>()?)
    }

    /// 摄入一条入站负载
    ///
    /// 解析失败记告警并丢弃，摄入路径不会中断；
    /// 成功则在缓冲锁下追加，除锁竞争外不阻塞调用方。
    pub async fn ingest(&self, raw: &str) {
        match Self::parse_sample(raw) {
            Ok(value) => {
                {
                    let mut buffer = self.buffer.lock().await;
                    buffer.push(value);
                }
                counter!("pulse_samples_ingested_total", 1);
                debug!(value, "Sample buffered");
            }
            Err(e) => {
                counter!("pulse_parse_failures_total", 1);
                warn!(payload = %raw, error = %e, "Non-numeric payload ignored");
            }
        }
    }

    /// 翻转当前窗口
    ///
    /// 空窗口静默跳过；否则在锁下计算均值并原地清空缓冲，
    /// 释放锁之后再格式化并发布汇总。
    pub async fn tick(&self) -> Option<WindowSummary> {
        let summary = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return None;
            }
            let sample_count = buffer.len();
            let sum: f64 = buffer.iter().sum();
            buffer.clear();
            WindowSummary {
                sample_count,
                mean: sum / sample_count as f64,
            }
        };

        counter!("pulse_windows_emitted_total", 1);
        if let Err(e) = self.sink.publish(summary.to_string()).await {
            // 基座是尽力而为的，发布失败不终止定时循环
            debug!(error = %e, "Summary publish failed");
        }
        Some(summary)
    }

    /// 周期运行直到收到关闭信号
    ///
    /// 关闭时不做最后一次部分窗口的刷新，缓冲中的残余采样直接丢弃。
    pub async fn run(&self, period: Duration, mut shutdown: broadcast::Receiver<ShutdownSignal>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval 的第一次 tick 立即完成
        ticker.tick().await;

        info!(period_secs = period.as_secs_f64(), "Averaging window started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(summary) = self.tick().await {
                        info!(count = summary.sample_count, mean = summary.mean, "Window flushed");
                    }
                }
                signal = shutdown.recv() => {
                    info!(signal = ?signal.ok(), "Aggregator stopping");
                    break;
                }
            }
        }

        let dropped = self.buffer.lock().await.len();
        if dropped > 0 {
            debug!(dropped, "Partial window discarded on shutdown");
        }
    }
}

#[async_trait]
impl<S: PublishSink> MessageBridge for WindowedAggregator<S> {
    async fn ingest(&self, msg: &Message) {
        self.ingest(msg.payload.as_str()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_shutdown::SignalHandler;
    use std::sync::Arc;
    use tokio::time::timeout;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PublishSink for RecordingSink {
        async fn publish(&self, payload: String) -> Result<()> {
            self.published.lock().await.push(payload);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl PublishSink for FailingSink {
        async fn publish(&self, _payload: String) -> Result<()> {
            Err(pulse_core::PulseError::ChannelSend("no subscribers".into()))
        }
    }

    #[test]
    fn test_parse_sample() {
        assert_eq!(
            WindowedAggregator::<FailingSink>::parse_sample(" 2.5 ").unwrap(),
            2.5
        );
        assert!(WindowedAggregator::<FailingSink>::parse_sample("gibberish").is_err());
        assert!(WindowedAggregator::<FailingSink>::parse_sample("").is_err());
    }

    #[tokio::test]
    async fn test_window_mean() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = WindowedAggregator::new(sink.clone());

        aggregator.ingest("1.0").await;
        aggregator.ingest("2.0").await;
        aggregator.ingest("3.0").await;

        let summary = aggregator.tick().await.expect("Window should flush");
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.mean, 2.0);

        let published = sink.published.lock().await;
        assert_eq!(published.as_slice(), ["Average(3 samples): 2.00"]);
    }

    #[tokio::test]
    async fn test_empty_window_is_silent() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = WindowedAggregator::new(sink.clone());

        assert!(aggregator.tick().await.is_none());
        assert!(sink.published.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_leaves_buffer_empty() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = WindowedAggregator::new(sink.clone());

        aggregator.ingest("5.0").await;
        assert!(aggregator.tick().await.is_some());

        // 排空之后立即再翻转一次：没有新采样，不应再发布
        assert!(aggregator.tick().await.is_none());
        assert_eq!(sink.published.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_samples_never_cross_windows() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = WindowedAggregator::new(sink.clone());

        aggregator.ingest("1.0").await;
        aggregator.ingest("2.0").await;
        let first = aggregator.tick().await.unwrap();

        aggregator.ingest("10.0").await;
        let second = aggregator.tick().await.unwrap();

        assert_eq!(first.sample_count, 2);
        assert_eq!(first.mean, 1.5);
        assert_eq!(second.sample_count, 1);
        assert_eq!(second.mean, 10.0);
    }

    #[tokio::test]
    async fn test_malformed_payload_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = WindowedAggregator::new(sink.clone());

        aggregator.ingest("not-a-number").await;
        assert!(aggregator.tick().await.is_none());

        // 后续合法采样照常聚合
        aggregator.ingest("5.0").await;
        let summary = aggregator.tick().await.unwrap();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.mean, 5.0);
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_loop_alive() {
        let aggregator = WindowedAggregator::new(FailingSink);

        aggregator.ingest("1.0").await;
        // 发布失败不应该 panic，窗口仍然被排空
        let summary = aggregator.tick().await.unwrap();
        assert_eq!(summary.sample_count, 1);
        assert!(aggregator.tick().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_discards_partial_window() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = Arc::new(WindowedAggregator::new(sink.clone()));
        let handler = SignalHandler::new();
        let shutdown_rx = handler.subscribe();

        let runner = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move {
                aggregator.run(Duration::from_secs(60), shutdown_rx).await;
            })
        };

        aggregator.ingest("5.0").await;
        handler.trigger(ShutdownSignal::Manual);

        timeout(Duration::from_secs(1), runner)
            .await
            .expect("Aggregator did not stop on shutdown")
            .unwrap();

        // 残余的部分窗口不发布
        assert!(sink.published.lock().await.is_empty());
    }
}
