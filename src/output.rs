// 该文件是 Zhamen （闸门） 项目的一部分。
// src/output.rs - 推理结果输出
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};
use crate::model::InferenceResult;

/// 单帧推理失败，作为结果值交给输出端，不会传播到生产者
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceFailure {
  #[error("分类器 {classifier} 失败: {message}")]
  Classifier { classifier: String, message: String },
  #[error("分类器异常终止: {0}")]
  Panicked(String),
}

/// 一帧的推理结论，带有来源帧的采集时间戳
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
  pub frame_timestamp_ms: u64,
  pub width: u32,
  pub height: u32,
  pub result: Result<InferenceResult, InferenceFailure>,
}

impl InferenceOutcome {
  pub fn is_success(&self) -> bool {
    self.result.is_ok()
  }
}

/// 结果接收端，只在交付线程上被调用
pub trait ResultSink: Send + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error>;

  fn finish(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

mod channel_sink;
mod delivery;
mod log_sink;

pub use self::channel_sink::{ChannelSink, ChannelSinkError};
pub use self::delivery::{DeliveryContext, DeliveryError, DeliveryHandle};
pub use self::log_sink::LogSink;

#[cfg(feature = "json_lines_output")]
mod json_lines;
#[cfg(feature = "json_lines_output")]
pub use self::json_lines::{JsonLinesSink, JsonLinesSinkError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "json_lines_output")]
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesSinkError(#[from] JsonLinesSinkError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogSink),
  #[cfg(feature = "json_lines_output")]
  JsonLines(JsonLinesSink),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogSink::SCHEME => Ok(OutputWrapper::Log(LogSink::from_url(url)?)),
      #[cfg(feature = "json_lines_output")]
      JsonLinesSink::SCHEME => Ok(OutputWrapper::JsonLines(JsonLinesSink::from_url(url)?)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl ResultSink for OutputWrapper {
  type Error = OutputError;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(sink) => match sink.deliver(outcome) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      #[cfg(feature = "json_lines_output")]
      OutputWrapper::JsonLines(sink) => sink.deliver(outcome).map_err(OutputError::from),
    }
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(_) => Ok(()),
      #[cfg(feature = "json_lines_output")]
      OutputWrapper::JsonLines(sink) => sink.finish().map_err(OutputError::from),
    }
  }
}
