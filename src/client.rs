//! Bedrock 客户端核心模块
use crate::{
    aggregator::{AggregationResult, StreamAggregator},
    chunk::RawChunk,
    config::Config,
    error::{BedrockError, Result},
    stream::chunk_stream,
    types::{InvokeRequest, Message, Role},
    utils::message,
};
use futures::{Stream, StreamExt};
use log::{debug, error};
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

/// 原始数据块流
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<RawChunk>> + Send>>;

// ================================================================================================
// 核心客户端模块
// ================================================================================================

/// Bedrock 客户端
///
/// 提供调用 Bedrock `invoke-with-response-stream` 接口的核心功能
#[derive(Debug, Clone)]
pub struct BedrockClient {
    client: Arc<Client>,
    config: Arc<Config>,
    semaphore: Arc<Semaphore>,
}

impl BedrockClient {
    /// 创建一个新的 `BedrockClient` 实例
    pub fn new(config: Config) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive)
            .tcp_nodelay(config.tcp_nodelay)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build reqwest client: {}", e);
                Client::new()
            });
        Self::with_http_client(config, client)
    }

    /// 使用自定义的 `reqwest::Client` 创建实例（代理、测试替身等）
    pub fn with_http_client(config: Config, client: Client) -> Self {
        let semaphore = Semaphore::new(config.max_concurrent_requests.unwrap_or(16));
        Self {
            client: Arc::new(client),
            config: Arc::new(config),
            semaphore: Arc::new(semaphore),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 流式调用接口的完整 URL
    pub fn invoke_url(&self) -> String {
        format!(
            "{}/model/{}/invoke-with-response-stream",
            self.config.endpoint(),
            self.config.model_id
        )
    }

    /// 构建 API 请求所需的 HTTP 标头
    fn build_headers(&self) -> Result<HeaderMap> {
        let token = self.config.credential_source.resolve()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| BedrockError::InvalidRequest(format!("Invalid bearer token: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE));
        Ok(headers)
    }

    /// 根据配置构建请求体
    pub fn build_request(&self, messages: Vec<Message>) -> InvokeRequest {
        InvokeRequest {
            anthropic_version: self.config.anthropic_version.clone(),
            max_tokens: self.config.max_tokens,
            messages,
            system: self.config.system_prompt.clone(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
        }
    }

    /// 发送 HTTP 请求并检查状态码
    ///
    /// 不做重试，失败直接返回
    async fn call_api(&self, request_builder: RequestBuilder) -> Result<Response> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| BedrockError::InvalidRequest(format!("Semaphore acquisition failed: {}", e)))?;

        let response_result = request_builder.send().await;
        drop(permit);

        let response = response_result?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(error_for_status(status, &body))
        }
    }

    /// 为给定的提示发起流式调用
    pub async fn invoke_stream(&self, prompt: &str) -> Result<ChunkStream> {
        self.invoke_stream_messages(vec![message(Role::User, prompt)])
            .await
    }

    /// 为给定的消息列表发起流式调用
    pub async fn invoke_stream_messages(&self, messages: Vec<Message>) -> Result<ChunkStream> {
        if messages.is_empty() {
            return Err(BedrockError::InvalidRequest("messages must not be empty".into()));
        }

        let url = self.invoke_url();
        let headers = self.build_headers()?;
        let body = self.build_request(messages);
        debug!("POST {} ({} messages)", url, body.messages.len());

        let request_builder = self.client.post(&url).headers(headers).json(&body);
        let response = self.call_api(request_builder).await?;

        Ok(chunk_stream(response.bytes_stream()).boxed())
    }

    /// 发起流式调用并用给定的聚合器消费整个流
    pub async fn stream_prompt(
        &self,
        prompt: &str,
        aggregator: StreamAggregator<'_>,
    ) -> Result<AggregationResult> {
        let stream = self.invoke_stream(prompt).await?;
        aggregator.process(stream).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// 将非 2xx 响应映射为错误
fn error_for_status(status: StatusCode, body: &str) -> BedrockError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BedrockError::Auth(message),
        StatusCode::NOT_FOUND => BedrockError::ModelNotFound(message),
        StatusCode::TOO_MANY_REQUESTS => BedrockError::RateLimit(message),
        _ => BedrockError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
