use serde::{Serialize, Deserialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: String,
    pub timestamp: i64,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
