//! 工具函数模块
use crate::aggregator::AggregationResult;
use crate::types::{ContentBlock, Message, Role};
use std::fmt::Write;

/// 创建消息的便捷函数
///
/// # 参数
///
/// * `role` - 消息角色
/// * `text` - 消息文本
///
/// # 返回
///
/// 只含一个文本块的消息
pub fn message(role: Role, text: &str) -> Message {
    Message {
        role,
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
    }
}

/// 渲染聚合结果的可读摘要：角色、调用指标和完整文本
pub fn summary(result: &AggregationResult) -> String {
    let mut out = String::new();
    if let Some(role) = &result.role {
        let _ = writeln!(out, "The message's role: {}", role);
    }
    if let Some(m) = &result.metrics {
        let _ = writeln!(out, "Number of input tokens: {}", m.input_tokens);
        let _ = writeln!(out, "Number of output tokens: {}", m.output_tokens);
        let _ = writeln!(out, "Invocation latency: {}", m.invocation_latency_ms);
        let _ = writeln!(out, "First byte latency: {}", m.first_byte_latency_ms);
    }
    let _ = writeln!(out, "Complete response:");
    out.push_str(&result.complete_text);
    out
}
