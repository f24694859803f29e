//! 流式数据块模块
//!
//! 数据块在进入聚合器之前只解码一次，解码结果是封闭的 [`Chunk`] 枚举，
//! 未识别的标签统一落入 [`Chunk::Unknown`]。
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ================================================================================================
// 领域数据块
// ================================================================================================

/// `message_stop` 数据块携带的调用指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageStopMetrics {
    /// 输入 token 数量
    #[serde(rename = "inputTokenCount")]
    pub input_tokens: u64,
    /// 输出 token 数量
    #[serde(rename = "outputTokenCount")]
    pub output_tokens: u64,
    /// 调用总延迟（毫秒）
    #[serde(rename = "invocationLatency")]
    pub invocation_latency_ms: u64,
    /// 首字节延迟（毫秒）
    #[serde(rename = "firstByteLatency")]
    pub first_byte_latency_ms: u64,
}

/// 解码后的数据块
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// 消息开始，携带角色
    MessageStart { role: String },
    /// 文本增量
    ContentDelta { text: String },
    /// 消息结束，携带调用指标
    MessageStop { metrics: MessageStopMetrics },
    /// 未识别的数据块，聚合时忽略
    Unknown,
}

impl Chunk {
    /// 从原始字节解码
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice::<WireChunk>(bytes).map(Chunk::from)
    }

    /// 从已解析的 JSON 值解码
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value::<WireChunk>(value).map(Chunk::from)
    }
}

// ================================================================================================
// 线上格式
// ================================================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireChunk {
    #[serde(rename = "message_start")]
    MessageStart { message: WireMessage },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: WireDelta },
    #[serde(rename = "message_stop")]
    MessageStop {
        #[serde(rename = "amazon-bedrock-invocationMetrics")]
        metrics: MessageStopMetrics,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    role: String,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    // 工具调用的 input_json_delta 没有 text 字段
    #[serde(default)]
    text: Option<String>,
}

impl From<WireChunk> for Chunk {
    fn from(wire: WireChunk) -> Self {
        match wire {
            WireChunk::MessageStart { message } => Chunk::MessageStart { role: message.role },
            WireChunk::ContentBlockDelta { delta } => match delta.text {
                Some(text) => Chunk::ContentDelta { text },
                None => Chunk::Unknown,
            },
            WireChunk::MessageStop { metrics } => Chunk::MessageStop { metrics },
            WireChunk::Other => Chunk::Unknown,
        }
    }
}

// ================================================================================================
// 原始数据块
// ================================================================================================

/// 聚合器的输入单元：未解码的字节、已解析的 JSON 或已解码的数据块
#[derive(Debug, Clone)]
pub enum RawChunk {
    Bytes(Bytes),
    Json(Value),
    Decoded(Chunk),
}

impl RawChunk {
    /// 解码为 [`Chunk`]
    pub fn decode(self) -> serde_json::Result<Chunk> {
        match self {
            RawChunk::Bytes(bytes) => Chunk::from_slice(&bytes),
            RawChunk::Json(value) => Chunk::from_value(value),
            RawChunk::Decoded(chunk) => Ok(chunk),
        }
    }
}

impl From<Bytes> for RawChunk {
    fn from(bytes: Bytes) -> Self {
        RawChunk::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RawChunk {
    fn from(bytes: Vec<u8>) -> Self {
        RawChunk::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static str> for RawChunk {
    fn from(s: &'static str) -> Self {
        RawChunk::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Value> for RawChunk {
    fn from(value: Value) -> Self {
        RawChunk::Json(value)
    }
}

impl From<Chunk> for RawChunk {
    fn from(chunk: Chunk) -> Self {
        RawChunk::Decoded(chunk)
    }
}
