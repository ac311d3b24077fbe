// 该文件是 Zhamen （闸门） 项目的一部分。
// src/output/log_sink.rs - 日志输出
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

use std::convert::Infallible;

use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{InferenceOutcome, ResultSink},
};

/// 把置信度最高的标签写入日志
#[derive(Debug, Default, Clone)]
pub struct LogSink {
  delivered: u64,
}

impl LogSink {
  pub fn delivered(&self) -> u64 {
    self.delivered
  }
}

impl FromUrlWithScheme for LogSink {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogSink {
  type Error = crate::output::OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(crate::output::OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(LogSink::default())
  }
}

impl ResultSink for LogSink {
  type Error = Infallible;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
    self.delivered += 1;
    match &outcome.result {
      Ok(result) => match result.top() {
        Some(top) => info!(
          "帧 {} ({}x{}): {} {:.2}%",
          outcome.frame_timestamp_ms,
          outcome.width,
          outcome.height,
          top.label,
          top.score * 100.0
        ),
        None => info!("帧 {}: 无高于阈值的标签", outcome.frame_timestamp_ms),
      },
      Err(failure) => warn!("帧 {} 推理失败: {}", outcome.frame_timestamp_ms, failure),
    }
    Ok(())
  }
}
