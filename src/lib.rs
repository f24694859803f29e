//! # bedrock-stream - Bedrock 流式响应客户端
//!
//! bedrock-stream 调用 Amazon Bedrock 上托管的 Claude 模型，以流式方式接收响应，
//! 在文本到达时实时输出，并在流结束后给出完整消息与调用指标。
//!
//! ## 主要特性
//!
//! - 🔄 **流式聚合**：[`StreamAggregator`] 按标签分发数据块，累积文本并通过回调实时输出。
//! - 🧩 **封闭的数据块类型**：数据块在边界处一次性解码为 [`Chunk`]，未知标签被安全忽略。
//! - 📦 **event-stream 解码**：内置 AWS `application/vnd.amazon.eventstream` 帧解析与 CRC 校验。
//! - 🔧 **显式配置**：区域、凭证来源和端点都通过 [`Config`] 传入，没有全局客户端。
//! - 🛡️ **错误处理**：解码错误与传输错误分开，并携带已累积的部分文本。
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use bedrock_stream::{BedrockClient, Config, StreamAggregator};
//! use bedrock_stream::error::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // 从环境变量加载配置 (需要设置 AWS_BEARER_TOKEN_BEDROCK)
//!     let config = Config::from_env()?;
//!     let client = BedrockClient::new(config);
//!
//!     let aggregator = StreamAggregator::new().on_text(|text| print!("{}", text));
//!     let result = client.stream_prompt("Tell me a story!", aggregator).await?;
//!     println!("\n{}", bedrock_stream::utils::summary(&result));
//!
//!     Ok(())
//! }
//! ```

// 模块定义
pub mod aggregator;
pub mod chunk;
pub mod client;
pub mod config;
pub mod error;
pub mod stream;
pub mod types;
pub mod utils;

pub use aggregator::{AggregationResult, ChunkSource, StreamAggregator, StreamObserver};
pub use chunk::{Chunk, MessageStopMetrics, RawChunk};
pub use client::BedrockClient;
pub use config::{Config, CredentialSource};
pub use error::{BedrockError, Result};
