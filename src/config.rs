//! 配置模块
//!
//! 客户端不持有任何全局状态：区域、凭证来源和端点都通过 [`Config`] 显式传入
use crate::error::{BedrockError, Result};
use std::env;
use std::time::Duration;

// ===============================================================================================
// 凭证来源
// ===============================================================================================

/// 默认读取的 Bedrock API Key 环境变量
pub const BEARER_TOKEN_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";

/// Bedrock API Key 的来源
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// 直接给定的 token
    Static(String),
    /// 每次请求时从指定环境变量读取
    Environment(String),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Environment(BEARER_TOKEN_ENV.into())
    }
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Static(_) => f.write_str("Static(***)"),
            CredentialSource::Environment(var) => f.debug_tuple("Environment").field(var).finish(),
        }
    }
}

impl CredentialSource {
    /// 解析出 token，缺失或为空时返回 `Auth` 错误
    pub fn resolve(&self) -> Result<String> {
        let token = match self {
            CredentialSource::Static(token) => token.clone(),
            CredentialSource::Environment(var) => env::var(var)
                .map_err(|_| BedrockError::Auth(format!("{} not set", var)))?,
        };
        if token.trim().is_empty() {
            return Err(BedrockError::Auth("empty bearer token".into()));
        }
        Ok(token)
    }
}

// ===============================================================================================
// 配置模块
// ===============================================================================================

/// Bedrock 客户端配置
///
/// 包含所有必要的配置参数，支持 Builder 模式和环境变量配置
#[derive(Debug, Clone)]
pub struct Config {
    /// AWS 区域
    pub(crate) region: String,
    /// 凭证来源
    pub(crate) credential_source: CredentialSource,
    /// 自定义端点，未设置时按区域推导
    pub(crate) endpoint: Option<String>,
    /// 模型 ID
    pub(crate) model_id: String,
    /// Anthropic 接口版本
    pub(crate) anthropic_version: String,
    /// 最大生成 token 数
    pub(crate) max_tokens: u32,
    /// 系统提示
    pub(crate) system_prompt: Option<String>,
    /// 温度参数 (0.0-1.0)
    pub(crate) temperature: Option<f32>,
    /// Top-p 参数 (0.0-1.0)
    pub(crate) top_p: Option<f32>,
    /// 请求超时时间
    pub(crate) timeout: Duration,
    /// 最大并发请求数
    pub(crate) max_concurrent_requests: Option<usize>,
    /// 连接池空闲超时时间
    pub(crate) pool_idle_timeout: Duration,
    /// 每个主机的最大空闲连接数
    pub(crate) pool_max_idle_per_host: usize,
    /// TCP Keepalive
    pub(crate) tcp_keepalive: Duration,
    /// TCP Nodelay
    pub(crate) tcp_nodelay: bool,
}

impl Default for Config {
    /// 创建默认配置
    ///
    /// 使用 us-west-2 区域的 Claude 3 Haiku 作为默认选择
    fn default() -> Self {
        Self {
            region: "us-west-2".into(),
            credential_source: CredentialSource::default(),
            endpoint: None,
            model_id: "anthropic.claude-3-haiku-20240307-v1:0".into(),
            anthropic_version: "bedrock-2023-05-31".into(),
            max_tokens: 1000,
            system_prompt: None,
            temperature: None,
            top_p: None,
            timeout: Duration::from_secs(60),
            max_concurrent_requests: Some(16),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 16,
            tcp_keepalive: Duration::from_secs(60),
            tcp_nodelay: true,
        }
    }
}

/// 生成 Config Builder 方法的宏
///
/// 自动生成 `with_field_name` 形式的 builder 方法
macro_rules! config_builder {
    ($field:ident, $type:ty) => {
        paste::paste! {
            #[doc = "设置 `"]
            #[doc = stringify!($field)]
            #[doc = "`"]
            pub fn [<with_ $field>](mut self, $field: $type) -> Self {
                self.$field = $field;
                self
            }
        }
    };
    ($field:ident, $type:ty, option) => {
        paste::paste! {
            #[doc = "设置 `"]
            #[doc = stringify!($field)]
            #[doc = "`"]
            pub fn [<with_ $field>](mut self, $field: $type) -> Self {
                self.$field = Some($field);
                self
            }
        }
    };
}

impl Config {
    pub fn region(&self) -> &str { &self.region }
    pub fn model_id(&self) -> &str { &self.model_id }
    pub fn anthropic_version(&self) -> &str { &self.anthropic_version }
    pub fn max_tokens(&self) -> u32 { self.max_tokens }
    pub fn timeout(&self) -> Duration { self.timeout }
    pub fn credential_source(&self) -> &CredentialSource { &self.credential_source }

    /// 实际使用的端点
    ///
    /// 显式端点优先，否则为 `https://bedrock-runtime.{region}.amazonaws.com`
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }

    /// 从环境变量和 `.env` 文件加载配置
    ///
    /// 环境变量会覆盖 `.env` 文件中的设置
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    ///
    /// 必须提供 `AWS_BEARER_TOKEN_BEDROCK`，其余变量缺省时使用默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup(BEARER_TOKEN_ENV)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BedrockError::Config(format!("{} not found", BEARER_TOKEN_ENV)))?;

        let defaults = Config::default();
        let region = lookup("AWS_REGION")
            .or_else(|| lookup("AWS_DEFAULT_REGION"))
            .unwrap_or(defaults.region.clone());
        let model_id = lookup("BEDROCK_MODEL_ID").unwrap_or(defaults.model_id.clone());
        let max_tokens = match lookup("BEDROCK_MAX_TOKENS") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| BedrockError::Config(format!("invalid BEDROCK_MAX_TOKENS: {}", raw)))?,
            None => defaults.max_tokens,
        };

        Ok(Config {
            region,
            credential_source: CredentialSource::Static(token),
            endpoint: lookup("BEDROCK_ENDPOINT"),
            model_id,
            max_tokens,
            ..defaults
        })
    }

    // 使用宏生成 builder 方法
    config_builder!(region, String);
    config_builder!(credential_source, CredentialSource);
    config_builder!(endpoint, String, option);
    config_builder!(model_id, String);
    config_builder!(anthropic_version, String);
    config_builder!(max_tokens, u32);
    config_builder!(system_prompt, String, option);
    config_builder!(temperature, f32, option);
    config_builder!(top_p, f32, option);
    config_builder!(timeout, Duration);
    config_builder!(max_concurrent_requests, usize, option);
    config_builder!(pool_idle_timeout, Duration);
    config_builder!(pool_max_idle_per_host, usize);
    config_builder!(tcp_keepalive, Duration);
    config_builder!(tcp_nodelay, bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    /// Tests that the default configuration is created correctly.
    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.model_id, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.anthropic_version, "bedrock-2023-05-31");
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(
            config.credential_source,
            CredentialSource::Environment(BEARER_TOKEN_ENV.into())
        );
        assert!(config.endpoint.is_none());
    }

    /// Tests the builder methods for setting configuration fields.
    #[test]
    fn test_config_builder_methods() {
        let config = Config::default()
            .with_region("eu-central-1".to_string())
            .with_model_id("test_model".to_string())
            .with_credential_source(CredentialSource::Static("token".into()))
            .with_temperature(0.9)
            .with_max_tokens(64);

        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.model_id, "test_model");
        assert_eq!(config.temperature, Some(0.9));
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.credential_source.resolve().unwrap(), "token");
    }

    /// Tests endpoint resolution from region and from an explicit override.
    #[test]
    fn test_endpoint_resolution() {
        let config = Config::default().with_region("ap-northeast-1".to_string());
        assert_eq!(config.endpoint(), "https://bedrock-runtime.ap-northeast-1.amazonaws.com");

        let config = config.with_endpoint("http://localhost:4566/".to_string());
        assert_eq!(config.endpoint(), "http://localhost:4566");
    }

    /// Tests loading configuration from a complete set of variables.
    #[test]
    fn test_from_lookup_reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            (BEARER_TOKEN_ENV, "abc"),
            ("AWS_REGION", "us-east-1"),
            ("BEDROCK_MODEL_ID", "anthropic.claude-3-5-sonnet-20240620-v1:0"),
            ("BEDROCK_ENDPOINT", "http://127.0.0.1:9000"),
            ("BEDROCK_MAX_TOKENS", "256"),
        ]))
        .unwrap();

        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.model_id, "anthropic.claude-3-5-sonnet-20240620-v1:0");
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.credential_source.resolve().unwrap(), "abc");
    }

    /// Tests that defaults fill in when only the token is set.
    #[test]
    fn test_from_lookup_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (BEARER_TOKEN_ENV, "abc"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.model_id, Config::default().model_id);
        assert_eq!(config.max_tokens, 1000);
    }

    /// Tests that an error is returned if the token is missing or blank.
    #[test]
    fn test_from_lookup_missing_token() {
        let result = Config::from_lookup(lookup_from(&[("AWS_REGION", "us-east-1")]));
        assert!(matches!(result, Err(BedrockError::Config(_))));

        let result = Config::from_lookup(lookup_from(&[(BEARER_TOKEN_ENV, "  ")]));
        assert!(matches!(result, Err(BedrockError::Config(_))));
    }

    /// Tests that a non-numeric max tokens value is rejected.
    #[test]
    fn test_from_lookup_invalid_max_tokens() {
        let result = Config::from_lookup(lookup_from(&[
            (BEARER_TOKEN_ENV, "abc"),
            ("BEDROCK_MAX_TOKENS", "lots"),
        ]));
        assert!(matches!(result, Err(BedrockError::Config(_))));
    }

    /// Tests credential resolution failures.
    #[test]
    fn test_credential_resolution_errors() {
        let missing = CredentialSource::Environment("BEDROCK_STREAM_TEST_UNSET_VAR".into());
        assert!(matches!(missing.resolve(), Err(BedrockError::Auth(_))));

        let empty = CredentialSource::Static(String::new());
        assert!(matches!(empty.resolve(), Err(BedrockError::Auth(_))));
    }

    /// Tests that static tokens are not printed by Debug.
    #[test]
    fn test_static_token_is_redacted() {
        let debug = format!("{:?}", CredentialSource::Static("secret".into()));
        assert!(!debug.contains("secret"));
    }
}
