// 该文件是 Zhamen （闸门） 项目的一部分。
// src/bin/simple_camera.rs - 摄像头实时分类
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use zhamen::{
  FromUrl,
  config::{self, PipelineConfig},
  input::InputWrapper,
  model::ClassifierWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// Zhamen 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类器，例如 stub://?latency_ms=300
  #[arg(long, value_name = "MODEL", default_value = "stub://")]
  pub model: Url,
  /// 输入来源，例如 synthetic://?fps=30 或 image:///path/to/cat.jpg
  #[arg(long, value_name = "SOURCE", default_value = "synthetic://")]
  pub input: Url,
  /// 输出，例如 log:// 或 jsonl:///tmp/results.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log://")]
  pub output: Url,

  /// 两次准入之间的最小间隔（毫秒）
  #[arg(long, value_name = "MS", default_value_t = config::DEFAULT_MIN_INFERENCE_INTERVAL_MS as i64, allow_negative_numbers = true)]
  pub min_interval_ms: i64,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD", default_value_t = config::DEFAULT_SCORE_THRESHOLD)]
  pub score_threshold: f32,
  /// 每个结果保留的标签数
  #[arg(long, value_name = "COUNT", default_value_t = config::DEFAULT_RESULT_COUNT)]
  pub result_count: usize,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("分类器: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = PipelineConfig::builder()
    .min_inference_interval_ms(args.min_interval_ms)
    .score_threshold(args.score_threshold)
    .result_count(args.result_count)
    .build()?;

  let input = InputWrapper::from_url(&args.input)?;
  let model = ClassifierWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let (_, stats) = ContinuousTask::new(config)
    .with_frame_number(args.frame_number)
    .run_task(input, model, output)?;

  println!("{}", stats);
  Ok(())
}
