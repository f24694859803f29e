//! # Claude 流式响应示例
//!
//! 这个示例展示了如何使用 bedrock-stream 的流式功能：
//! - 从环境变量加载配置
//! - 创建 BedrockClient 实例
//! - 发送流式调用请求
//! - 实时输出文本，并在结束后打印角色、调用指标和完整响应
//!
//! 用法: `cargo run --example claude_stream -- "Tell me a story!"`

use bedrock_stream::error::Result;
use bedrock_stream::{BedrockClient, Config, StreamAggregator};
use std::io::{self, Write};

/// 主函数：演示流式文本生成
///
/// # 返回
///
/// 返回 `Result<()>`，成功时为空，失败时包含错误
#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    env_logger::init();

    // 从环境变量加载配置
    let config = Config::from_env()?;
    println!("🔧 区域: {}", config.region());
    println!("🔧 模型: {}", config.model_id());

    let client = BedrockClient::new(config);

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Tell me a story!".to_string());

    let aggregator = StreamAggregator::new()
        .on_start(|role| println!("The message's role: {}", role))
        .on_text(|text| {
            print!("{}", text);
            let _ = io::stdout().flush();
        })
        .on_complete(|metrics| {
            println!("\nNumber of input tokens: {}", metrics.input_tokens);
            println!("Number of output tokens: {}", metrics.output_tokens);
            println!("Invocation latency: {}", metrics.invocation_latency_ms);
            println!("First byte latency: {}", metrics.first_byte_latency_ms);
        });

    match client.stream_prompt(&prompt, aggregator).await {
        Ok(result) => {
            println!("\nComplete response:");
            println!("{}", result.complete_text);
            Ok(())
        }
        Err(e) => {
            // 已输出的部分文本不会丢失
            if let Some(partial) = e.partial_text() {
                eprintln!("\n⚠️ 流中断，已接收 {} 字节", partial.len());
            }
            Err(e)
        }
    }
}
