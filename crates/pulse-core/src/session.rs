use crate::bus::EventBus;
use crate::error::{PulseError, Result};
use dashmap::DashMap;
use pulse_types::message::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// 会话：进程内 pub/sub 基座的作用域入口
///
/// 负责发布者/订阅者的声明与注销，以及发布者匹配状态的通知。
/// 句柄可廉价克隆，所有克隆共享同一条总线和同一个注册表。
/// 主题匹配语义为精确相等，层级通配由外部消息中间件承担。
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    bus: EventBus,
    // 订阅声明注册表：id -> 主题
    subscriptions: DashMap<u64, String>,
    // 匹配状态监听器：id -> (主题, 通知端)
    listeners: DashMap<u64, MatchingListener>,
    closed: watch::Sender<bool>,
    next_id: AtomicU64,
}

struct MatchingListener {
    topic: String,
    tx: watch::Sender<bool>,
}

impl Session {
    /// 打开一个新会话，capacity 为底层总线的消息容量
    pub fn open(capacity: usize) -> Self {
        let (closed, _) = watch::channel(false);
        info!(capacity, "Session opened");
        Self {
            inner: Arc::new(SessionInner {
                bus: EventBus::new(capacity),
                subscriptions: DashMap::new(),
                listeners: DashMap::new(),
                closed,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// 声明一个固定主题的发布者
    pub fn declare_publisher(&self, topic: impl Into<String>) -> Publisher {
        let topic = topic.into();
        debug!(topic = %topic, "Publisher declared");
        Publisher {
            topic,
            session: self.clone(),
        }
    }

    /// 声明一个订阅者；句柄 Drop 时自动注销
    pub fn declare_subscriber(&self, topic: impl Into<String>) -> Subscriber {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let rx = self.inner.bus.subscribe();
        self.inner.subscriptions.insert(id, topic.clone());
        debug!(topic = %topic, id, "Subscriber declared");
        self.inner.notify_matching(&topic);
        Subscriber {
            id,
            topic,
            rx,
            closed: self.inner.closed.subscribe(),
            session: self.clone(),
        }
    }

    /// 关闭会话：之后发布被拒绝，阻塞中的订阅者全部被唤醒并结束
    pub fn close(&self) {
        if self.inner.closed.send_replace(true) {
            return; // 已经关闭
        }
        info!("Session closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }
}

impl SessionInner {
    // 当前匹配某主题的订阅声明数量
    fn matching_count(&self, topic: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|entry| entry.value() == topic)
            .count()
    }

    fn register_listener(&self, topic: &str) -> watch::Receiver<bool> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(self.matching_count(topic) > 0);
        self.listeners.insert(
            id,
            MatchingListener {
                topic: topic.to_string(),
                tx,
            },
        );
        rx
    }

    fn deregister_subscriber(&self, id: u64) {
        if let Some((_, topic)) = self.subscriptions.remove(&id) {
            debug!(topic = %topic, id, "Subscriber deregistered");
            self.notify_matching(&topic);
        }
    }

    fn notify_matching(&self, topic: &str) {
        let matching = self.matching_count(topic) > 0;
        self.listeners.retain(|_, listener| {
            if listener.topic != topic {
                return true;
            }
            // 接收端已消失的监听器顺带移除
            listener.tx.send(matching).is_ok()
        });
    }
}

/// 固定主题的发布者句柄
pub struct Publisher {
    topic: String,
    session: Session,
}

impl Publisher {
    /// 以本发布者的主题发布一条不透明文本负载
    ///
    /// 返回总线上收到该消息的接收端数量。投递为尽力而为：
    /// 总线上没有任何接收端时返回 ChannelSend 错误，由调用方决定是否忽略。
    pub fn put(&self, payload: impl Into<String>) -> Result<usize> {
        if self.session.is_closed() {
            return Err(PulseError::SessionClosed);
        }
        let msg = Message::new(self.topic.clone(), payload);
        self.session.inner.bus.publish(msg).map_err(PulseError::from)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 匹配状态监听：本主题获得第一个/失去最后一个匹配订阅者时翻转
    pub fn matching_listener(&self) -> watch::Receiver<bool> {
        self.session.inner.register_listener(&self.topic)
    }
}

/// 订阅者句柄，按主题过滤总线上的消息
pub struct Subscriber {
    id: u64,
    topic: String,
    rx: broadcast::Receiver<Message>,
    closed: watch::Receiver<bool>,
    session: Session,
}

impl Subscriber {
    /// 接收下一条匹配本订阅主题的消息；会话关闭后返回 None
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            if *self.closed.borrow() {
                return None;
            }
            tokio::select! {
                res = self.rx.recv() => match res {
                    Ok(msg) if msg.topic == self.topic => return Some(msg),
                    Ok(_) => continue, // 其它主题的消息
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(topic = %self.topic, missed = n, "Subscriber lagged, oldest messages dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                changed = self.closed.changed() => {
                    if changed.is_err() || *self.closed.borrow() {
                        return None;
                    }
                }
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.session.inner.deregister_subscriber(self.id);
    }
}
