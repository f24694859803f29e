//! API 数据结构模块

use serde::{Deserialize, Serialize};

// ================================================================================================
// API 请求结构
// ================================================================================================

/// 对话消息
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// 角色
    pub role: Role,
    /// 内容块
    pub content: Vec<ContentBlock>,
}

/// 角色枚举
///
/// Anthropic Messages API 中系统提示不是消息，而是请求体的 `system` 字段
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 用户
    #[default]
    User,
    /// 机器人
    Assistant,
}

/// 消息内容块
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// 文本
    Text { text: String },
}

/// `invoke-with-response-stream` 请求体
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct InvokeRequest {
    /// Bedrock 上的 Anthropic 接口版本
    pub anthropic_version: String,
    /// 最大生成 token 数
    pub max_tokens: u32,
    /// 对话消息
    pub messages: Vec<Message>,
    /// 系统提示
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// 温度参数 (0.0-1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p 参数 (0.0-1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoke_request_serialization() {
        let request = InvokeRequest {
            anthropic_version: "bedrock-2023-05-31".into(),
            max_tokens: 1000,
            messages: vec![Message {
                role: Role::User,
                content: vec![ContentBlock::Text {
                    text: "Tell me a story!".into(),
                }],
            }],
            system: None,
            temperature: None,
            top_p: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 1000,
                "messages": [
                    {"role": "user", "content": [{"type": "text", "text": "Tell me a story!"}]}
                ]
            })
        );
    }

    #[test]
    fn test_optional_fields_are_serialized_when_set() {
        let request = InvokeRequest {
            anthropic_version: "bedrock-2023-05-31".into(),
            max_tokens: 10,
            messages: vec![],
            system: Some("Be brief.".into()),
            temperature: Some(0.5),
            top_p: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "Be brief.");
        assert_eq!(value["temperature"], 0.5);
        assert!(value.get("top_p").is_none());
    }
}
