// 该文件是 Zhamen （闸门） 项目的一部分。
// src/model/stub.rs - 平均颜色分类器
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

use std::{thread, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{Category, Classifier},
  query_value,
};

#[derive(Error, Debug)]
pub enum StubClassifierError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数 {key} 无效: {value}")]
  InvalidParameter { key: &'static str, value: String },
  #[error("第 {0} 次调用按配置注入失败")]
  InjectedFailure(u64),
}

/// 不加载模型权重的分类器
///
/// 按平均颜色给出 `red` / `green` / `blue` / `dark` 四个标签的置信度，
/// 可配置模拟延迟 `latency_ms` 与每 N 次失败一次的 `fail_every`。
///
/// `stub://?latency_ms=250&fail_every=10`
#[derive(Debug, Default, Clone)]
pub struct StubClassifier {
  latency: Duration,
  fail_every: Option<u64>,
  calls: u64,
}

impl FromUrlWithScheme for StubClassifier {
  const SCHEME: &'static str = "stub";
}

impl FromUrl for StubClassifier {
  type Error = StubClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StubClassifierError::SchemeMismatch);
    }

    let latency_ms = match query_value::<u64>(url, "latency_ms") {
      Some(Ok(v)) => v,
      Some(Err(value)) => {
        return Err(StubClassifierError::InvalidParameter {
          key: "latency_ms",
          value,
        });
      }
      None => 0,
    };
    let fail_every = match query_value::<u64>(url, "fail_every") {
      Some(Ok(0)) | None => None,
      Some(Ok(v)) => Some(v),
      Some(Err(value)) => {
        return Err(StubClassifierError::InvalidParameter {
          key: "fail_every",
          value,
        });
      }
    };

    info!(
      "Stub 分类器: 延迟 {}ms, 失败周期 {:?}",
      latency_ms, fail_every
    );

    Ok(StubClassifier::default()
      .with_latency(Duration::from_millis(latency_ms))
      .with_fail_every(fail_every))
  }
}

impl StubClassifier {
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn with_fail_every(mut self, fail_every: Option<u64>) -> Self {
    self.fail_every = fail_every.filter(|n| *n > 0);
    self
  }

  fn mean_rgb(frame: &Frame) -> [f32; 3] {
    let mut sums = [0u64; 3];
    for pixel in frame.pixels().chunks_exact(frame.channels()) {
      for (sum, value) in sums.iter_mut().zip(pixel) {
        *sum += *value as u64;
      }
    }
    let count = (frame.width() as u64 * frame.height() as u64) as f32;
    sums.map(|s| s as f32 / count / 255.0)
  }
}

impl Classifier for StubClassifier {
  type Error = StubClassifierError;

  fn name(&self) -> &str {
    Self::SCHEME
  }

  fn classify(&mut self, frame: &Frame) -> Result<Vec<Category>, Self::Error> {
    self.calls += 1;
    if !self.latency.is_zero() {
      thread::sleep(self.latency);
    }
    if let Some(n) = self.fail_every
      && self.calls % n == 0
    {
      return Err(StubClassifierError::InjectedFailure(self.calls));
    }

    let [r, g, b] = Self::mean_rgb(frame);
    let luma = 0.299 * r + 0.587 * g + 0.114 * b;
    debug!("帧 {} 平均颜色: ({:.3}, {:.3}, {:.3})", frame.timestamp_ms(), r, g, b);

    Ok(vec![
      Category::new("red", r),
      Category::new("green", g),
      Category::new("blue", b),
      Category::new("dark", 1.0 - luma),
    ])
  }
}
