//! 错误处理模块

use thiserror::Error;

/// bedrock-stream 库的统一错误类型
///
/// 聚合阶段产生的错误 (`Decode` / `Transport`) 会携带已经累积的部分文本，
/// 调用方可以自行决定部分输出是否可用
#[derive(Debug, Error)]
pub enum BedrockError {
    /// 数据块无法解码为合法的结构化文本
    #[error("数据块解码失败 (已累积 {} 字节文本): {source}", .partial.len())]
    Decode {
        #[source]
        source: serde_json::Error,
        /// 出错前已累积的文本
        partial: String,
    },

    /// 上游数据源在聚合过程中失败
    #[error("上游传输失败 (已累积 {} 字节文本): {source}", .partial.len())]
    Transport {
        #[source]
        source: Box<BedrockError>,
        /// 出错前已累积的文本
        partial: String,
    },

    /// HTTP 请求相关错误
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// API 服务端错误
    #[error("API错误 ({status}): {message}")]
    Api { status: u16, message: String },

    /// 身份验证失败
    #[error("身份验证失败: {0}")]
    Auth(String),

    /// API 请求频率限制
    #[error("请求频率超限: {0}")]
    RateLimit(String),

    /// 指定的模型不存在
    #[error("模型不存在: {0}")]
    ModelNotFound(String),

    /// event-stream 帧格式错误
    #[error("帧格式错误: {0}")]
    Frame(String),

    /// 服务端在流中返回的异常帧
    #[error("模型流异常 {exception}: {message}")]
    ModelStream { exception: String, message: String },

    /// JSON 序列化/反序列化错误
    #[error("JSON处理错误: {0}")]
    Json(String),

    /// 请求参数无效
    #[error("请求参数无效: {0}")]
    InvalidRequest(String),

    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),
}

/// bedrock-stream 库的 Result 类型别名
pub type Result<T> = std::result::Result<T, BedrockError>;

impl From<serde_json::Error> for BedrockError {
    fn from(e: serde_json::Error) -> Self {
        BedrockError::Json(e.to_string())
    }
}

impl BedrockError {
    /// 聚合失败时已累积的部分文本
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            BedrockError::Decode { partial, .. } | BedrockError::Transport { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, BedrockError::Decode { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BedrockError::Transport { .. })
    }

    /// 将上游错误包装为 `Transport`，附带部分文本
    ///
    /// 已经是 `Decode` / `Transport` 的错误保持原样
    pub(crate) fn into_transport(self, partial: &str) -> Self {
        match self {
            e @ (BedrockError::Decode { .. } | BedrockError::Transport { .. }) => e,
            other => BedrockError::Transport {
                source: Box::new(other),
                partial: partial.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_text_only_on_aggregation_errors() {
        let err = BedrockError::Frame("bad crc".into()).into_transport("ab");
        assert!(err.is_transport());
        assert_eq!(err.partial_text(), Some("ab"));
        assert!(BedrockError::Config("x".into()).partial_text().is_none());
    }

    #[test]
    fn test_into_transport_keeps_decode_errors() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = BedrockError::Decode {
            source,
            partial: "ab".into(),
        }
        .into_transport("abc");
        assert!(err.is_decode());
        assert_eq!(err.partial_text(), Some("ab"));
    }
}
