//! 流式响应聚合模块
//!
//! [`StreamAggregator`] 逐个消费数据块，按标签分发，累积文本并记录结束指标。
//! 聚合器只在等待下一个数据块时挂起，单个数据块的处理是同步且有序的：
//! 第 N 个数据块的累积与回调一定发生在第 N+1 个数据块之前。
//!
//! 协议顺序不做强制校验：`message_stop` 之后的文本增量照常累积，
//! 多个 `message_start` / `message_stop` 时以最后一个为准。
use crate::{
    chunk::{Chunk, MessageStopMetrics, RawChunk},
    error::{BedrockError, Result},
};
use futures::{FutureExt, Stream, StreamExt, future::BoxFuture};
use log::{debug, trace};

// ================================================================================================
// 数据源
// ================================================================================================

/// 聚合器的数据源：显式的“取下一个数据块”挂起点
///
/// 任何 `Stream<Item = Result<T>>`（`T: Into<RawChunk>`）都自动实现该 trait，
/// 测试中可以直接用 `futures::stream::iter` 驱动聚合器
pub trait ChunkSource {
    /// 获取下一个数据块，`None` 表示数据源已耗尽
    fn next_chunk(&mut self) -> BoxFuture<'_, Option<Result<RawChunk>>>;
}

impl<S, T> ChunkSource for S
where
    S: Stream<Item = Result<T>> + Unpin + Send,
    T: Into<RawChunk> + Send,
{
    fn next_chunk(&mut self) -> BoxFuture<'_, Option<Result<RawChunk>>> {
        self.next()
            .map(|item| item.map(|res| res.map(Into::into)))
            .boxed()
    }
}

// ================================================================================================
// 观察者
// ================================================================================================

/// 增量事件观察者，所有方法默认为空实现
pub trait StreamObserver {
    fn on_start(&mut self, _role: &str) {}
    fn on_text(&mut self, _text: &str) {}
    fn on_complete(&mut self, _metrics: &MessageStopMetrics) {}
}

type StartFn<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type TextFn<'a> = Box<dyn FnMut(&str) + Send + 'a>;
type CompleteFn<'a> = Box<dyn FnMut(&MessageStopMetrics) + Send + 'a>;

// ================================================================================================
// 聚合结果
// ================================================================================================

/// 完整消费一个流之后的聚合结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregationResult {
    /// 所有文本增量按顺序拼接的结果
    pub complete_text: String,
    /// 消息角色
    pub role: Option<String>,
    /// 最后一个 `message_stop` 携带的指标
    pub metrics: Option<MessageStopMetrics>,
    /// 处理过的数据块数量（含未识别的数据块）
    pub chunk_count: usize,
    /// 被跳过的未识别数据块数量
    pub skipped: usize,
}

// ================================================================================================
// 聚合器
// ================================================================================================

/// 流式响应聚合器
///
/// 每个流创建一个新实例，处理结束（或失败）后丢弃
///
/// ```rust
/// use bedrock_stream::aggregator::StreamAggregator;
/// use bedrock_stream::chunk::RawChunk;
/// use bedrock_stream::error::Result;
///
/// # async fn run() -> Result<()> {
/// let chunks: Vec<Result<RawChunk>> = vec![
///     Ok(r#"{"type":"content_block_delta","delta":{"text":"Hi"}}"#.into()),
/// ];
/// let result = StreamAggregator::new()
///     .on_text(|text| print!("{}", text))
///     .process(futures::stream::iter(chunks))
///     .await?;
/// assert_eq!(result.complete_text, "Hi");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct StreamAggregator<'a> {
    on_start: Option<StartFn<'a>>,
    on_text: Option<TextFn<'a>>,
    on_complete: Option<CompleteFn<'a>>,
    observer: Option<Box<dyn StreamObserver + Send + 'a>>,
    text: String,
    role: Option<String>,
    metrics: Option<MessageStopMetrics>,
    chunk_count: usize,
    skipped: usize,
}

impl<'a> StreamAggregator<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置消息开始回调
    pub fn on_start(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    /// 设置文本增量回调，每个文本增量调用一次，顺序与流一致
    pub fn on_text(mut self, f: impl FnMut(&str) + Send + 'a) -> Self {
        self.on_text = Some(Box::new(f));
        self
    }

    /// 设置消息结束回调
    pub fn on_complete(mut self, f: impl FnMut(&MessageStopMetrics) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// 附加一个 [`StreamObserver`]，在闭包回调之后调用
    pub fn with_observer(mut self, observer: impl StreamObserver + Send + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// 当前已累积的文本
    pub fn partial_text(&self) -> &str {
        &self.text
    }

    /// 消费整个数据源并返回聚合结果
    ///
    /// 解码失败返回 [`BedrockError::Decode`]，上游错误返回
    /// [`BedrockError::Transport`]，两者都携带出错前已累积的文本
    pub async fn process<S: ChunkSource>(mut self, mut source: S) -> Result<AggregationResult> {
        while let Some(item) = source.next_chunk().await {
            let raw = item.map_err(|e| e.into_transport(&self.text))?;
            self.feed(raw)?;
        }
        Ok(self.finish())
    }

    /// 处理单个数据块
    pub fn feed(&mut self, raw: impl Into<RawChunk>) -> Result<()> {
        self.chunk_count += 1;
        let raw: RawChunk = raw.into();
        let chunk = raw.decode().map_err(|source| BedrockError::Decode {
            source,
            partial: self.text.clone(),
        })?;

        match chunk {
            Chunk::MessageStart { role } => {
                trace!("message_start: role={}", role);
                if let Some(f) = self.on_start.as_mut() {
                    f(&role);
                }
                if let Some(obs) = self.observer.as_mut() {
                    obs.on_start(&role);
                }
                self.role = Some(role);
            }
            Chunk::ContentDelta { text } => {
                if self.metrics.is_some() {
                    debug!("content delta received after message_stop");
                }
                self.text.push_str(&text);
                if let Some(f) = self.on_text.as_mut() {
                    f(&text);
                }
                if let Some(obs) = self.observer.as_mut() {
                    obs.on_text(&text);
                }
            }
            Chunk::MessageStop { metrics } => {
                if self.metrics.is_some() {
                    debug!("duplicate message_stop, keeping the latest metrics");
                }
                if let Some(f) = self.on_complete.as_mut() {
                    f(&metrics);
                }
                if let Some(obs) = self.observer.as_mut() {
                    obs.on_complete(&metrics);
                }
                self.metrics = Some(metrics);
            }
            Chunk::Unknown => {
                trace!("skipping chunk with unrecognized tag");
                self.skipped += 1;
            }
        }
        Ok(())
    }

    /// 结束聚合并返回结果
    pub fn finish(self) -> AggregationResult {
        AggregationResult {
            complete_text: self.text,
            role: self.role,
            metrics: self.metrics,
            chunk_count: self.chunk_count,
            skipped: self.skipped,
        }
    }
}

impl std::fmt::Debug for StreamAggregator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAggregator")
            .field("text", &self.text)
            .field("role", &self.role)
            .field("metrics", &self.metrics)
            .field("chunk_count", &self.chunk_count)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
