use serde::{Serialize, Deserialize};
use std::fmt;

/// 窗口汇总结果
///
/// 仅在 sample_count > 0 时构造，刷新后立即序列化为文本，不再保留。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// 窗口内采样数量
    pub sample_count: usize,

    /// 算术平均值
    pub mean: f64,
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Average({} samples): {:.2}", self.sample_count, self.mean)
    }
}
