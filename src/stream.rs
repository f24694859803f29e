//! AWS event-stream 响应解码模块
//!
//! Bedrock 的流式接口以 `application/vnd.amazon.eventstream` 二进制帧返回数据：
//!
//! ```text
//! [total_len u32][headers_len u32][prelude_crc u32][headers][payload][message_crc u32]
//! ```
//!
//! 所有整数均为大端序。`chunk` 事件的负载是 `{"bytes": "<base64>"}`，
//! base64 解码后即为交给聚合器的原始数据块。
use crate::{
    chunk::RawChunk,
    error::{BedrockError, Result},
};
use async_stream::try_stream;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use log::debug;
use serde::Deserialize;

// ================================================================================================
// 帧结构
// ================================================================================================

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_FRAME_LEN: usize = PRELUDE_LEN + CRC_LEN;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// 帧头部的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Bytes),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

/// 一个完整的 event-stream 帧
#[derive(Debug, Clone)]
pub struct Frame {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Bytes,
}

impl Frame {
    /// 查找字符串类型的头部
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(k, v)| match v {
            HeaderValue::String(s) if k == name => Some(s.as_str()),
            _ => None,
        })
    }
}

/// 尝试从缓冲区头部解码一个完整帧
///
/// 数据不足时返回 `Ok(None)` 且不消耗缓冲区
pub fn decode_frame(buffer: &mut BytesMut) -> Result<Option<Frame>> {
    if buffer.len() < PRELUDE_LEN {
        return Ok(None);
    }

    let mut prelude = &buffer[..PRELUDE_LEN];
    let total_len = prelude.get_u32() as usize;
    let headers_len = prelude.get_u32() as usize;
    let prelude_crc = prelude.get_u32();

    if crc32fast::hash(&buffer[..8]) != prelude_crc {
        return Err(BedrockError::Frame("prelude crc mismatch".into()));
    }
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len) {
        return Err(BedrockError::Frame(format!("invalid frame length {}", total_len)));
    }
    if headers_len > total_len - MIN_FRAME_LEN {
        return Err(BedrockError::Frame(format!(
            "headers length {} exceeds frame length {}",
            headers_len, total_len
        )));
    }
    if buffer.len() < total_len {
        return Ok(None);
    }

    let frame = buffer.split_to(total_len).freeze();
    let body_end = total_len - CRC_LEN;
    let message_crc = (&frame[body_end..]).get_u32();
    if crc32fast::hash(&frame[..body_end]) != message_crc {
        return Err(BedrockError::Frame("message crc mismatch".into()));
    }

    let headers_end = PRELUDE_LEN + headers_len;
    let headers = parse_headers(&frame[PRELUDE_LEN..headers_end])?;
    let payload = frame.slice(headers_end..body_end);
    Ok(Some(Frame { headers, payload }))
}

fn parse_headers(mut buf: &[u8]) -> Result<Vec<(String, HeaderValue)>> {
    let mut headers = Vec::new();
    while buf.has_remaining() {
        let name_len = take(&mut buf, 1)?.get_u8() as usize;
        let name = utf8(take(&mut buf, name_len)?)?;
        let value_type = take(&mut buf, 1)?.get_u8();
        let value = match value_type {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(take(&mut buf, 1)?.get_i8()),
            3 => HeaderValue::Short(take(&mut buf, 2)?.get_i16()),
            4 => HeaderValue::Int(take(&mut buf, 4)?.get_i32()),
            5 => HeaderValue::Long(take(&mut buf, 8)?.get_i64()),
            6 => {
                let len = take(&mut buf, 2)?.get_u16() as usize;
                HeaderValue::Bytes(Bytes::copy_from_slice(take(&mut buf, len)?))
            }
            7 => {
                let len = take(&mut buf, 2)?.get_u16() as usize;
                HeaderValue::String(utf8(take(&mut buf, len)?)?)
            }
            8 => HeaderValue::Timestamp(take(&mut buf, 8)?.get_i64()),
            9 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(take(&mut buf, 16)?);
                HeaderValue::Uuid(uuid)
            }
            other => {
                return Err(BedrockError::Frame(format!(
                    "unknown header value type {} for '{}'",
                    other, name
                )));
            }
        };
        headers.push((name, value));
    }
    Ok(headers)
}

fn take<'b>(buf: &mut &'b [u8], n: usize) -> Result<&'b [u8]> {
    if buf.len() < n {
        return Err(BedrockError::Frame("truncated header".into()));
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| BedrockError::Frame(format!("header is not utf-8: {}", e)))
}

// ================================================================================================
// 帧语义
// ================================================================================================

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    bytes: String,
}

#[derive(Debug, Deserialize)]
struct ExceptionPayload {
    #[serde(default)]
    message: Option<String>,
}

/// 将一个帧解释为数据块；非 `chunk` 事件返回 `Ok(None)`
fn interpret(frame: Frame) -> Result<Option<RawChunk>> {
    match frame.header_str(":message-type") {
        Some("event") => match frame.header_str(":event-type") {
            Some("chunk") => {
                let payload: ChunkPayload = serde_json::from_slice(&frame.payload)
                    .map_err(|e| BedrockError::Frame(format!("invalid chunk envelope: {}", e)))?;
                let bytes = STANDARD
                    .decode(payload.bytes)
                    .map_err(|e| BedrockError::Frame(format!("invalid base64 chunk: {}", e)))?;
                Ok(Some(RawChunk::Bytes(Bytes::from(bytes))))
            }
            other => {
                debug!("skipping event type {:?}", other);
                Ok(None)
            }
        },
        Some("exception") => {
            let exception = frame
                .header_str(":exception-type")
                .unwrap_or("UnknownException")
                .to_string();
            let message = serde_json::from_slice::<ExceptionPayload>(&frame.payload)
                .ok()
                .and_then(|p| p.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&frame.payload).into_owned());
            Err(BedrockError::ModelStream { exception, message })
        }
        Some("error") => Err(BedrockError::ModelStream {
            exception: frame.header_str(":error-code").unwrap_or("UnknownError").to_string(),
            message: frame.header_str(":error-message").unwrap_or_default().to_string(),
        }),
        other => Err(BedrockError::Frame(format!("unexpected message type {:?}", other))),
    }
}

// ================================================================================================
// 流式解码
// ================================================================================================

/// 将 HTTP 字节流转换为原始数据块流
///
/// 帧可以跨越任意字节边界；异常帧或帧格式错误会产生一个错误并结束流
pub fn chunk_stream<S, E>(bytes_stream: S) -> impl Stream<Item = Result<RawChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    BedrockError: From<E>,
{
    try_stream! {
        let mut bytes_stream = std::pin::pin!(bytes_stream);
        let mut buffer = BytesMut::new();
        while let Some(bytes_res) = bytes_stream.next().await {
            let bytes = bytes_res.map_err(BedrockError::from)?;
            buffer.extend_from_slice(&bytes);

            while let Some(frame) = decode_frame(&mut buffer)? {
                if let Some(raw) = interpret(frame)? {
                    yield raw;
                }
            }
        }

        if !buffer.is_empty() {
            debug!("Leftover buffer: {} bytes", buffer.len());
        }
    }
}
