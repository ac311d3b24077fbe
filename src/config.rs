// 该文件是 Zhamen （闸门） 项目的一部分。
// src/config.rs - 管线配置
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

pub const DEFAULT_MIN_INFERENCE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.2;
pub const DEFAULT_RESULT_COUNT: usize = 3;
/// 准入闸门的忙碌标志只能保护单个推理线程
pub const WORKER_CONCURRENCY: usize = 1;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("最小推理间隔不能为负数: {0}ms")]
  NegativeInterval(i64),
  #[error("置信度阈值必须在 [0, 1] 之间: {0}")]
  ScoreThresholdOutOfRange(f32),
  #[error("结果数量必须大于 0")]
  ZeroResultCount,
  #[error("推理并发数只支持 1, 实际为 {0}")]
  UnsupportedConcurrency(usize),
}

/// 管线配置，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  min_inference_interval_ms: u64,
  score_threshold: f32,
  result_count: usize,
  worker_concurrency: usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      min_inference_interval_ms: DEFAULT_MIN_INFERENCE_INTERVAL_MS,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      result_count: DEFAULT_RESULT_COUNT,
      worker_concurrency: WORKER_CONCURRENCY,
    }
  }
}

impl PipelineConfig {
  pub fn builder() -> PipelineConfigBuilder {
    PipelineConfigBuilder::default()
  }

  pub fn min_inference_interval_ms(&self) -> u64 {
    self.min_inference_interval_ms
  }

  pub fn score_threshold(&self) -> f32 {
    self.score_threshold
  }

  pub fn result_count(&self) -> usize {
    self.result_count
  }

  pub fn worker_concurrency(&self) -> usize {
    self.worker_concurrency
  }
}

#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
  min_inference_interval_ms: i64,
  score_threshold: f32,
  result_count: usize,
  worker_concurrency: usize,
}

impl Default for PipelineConfigBuilder {
  fn default() -> Self {
    Self {
      min_inference_interval_ms: DEFAULT_MIN_INFERENCE_INTERVAL_MS as i64,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      result_count: DEFAULT_RESULT_COUNT,
      worker_concurrency: WORKER_CONCURRENCY,
    }
  }
}

impl PipelineConfigBuilder {
  pub fn min_inference_interval_ms(mut self, interval_ms: i64) -> Self {
    self.min_inference_interval_ms = interval_ms;
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn result_count(mut self, count: usize) -> Self {
    self.result_count = count;
    self
  }

  pub fn worker_concurrency(mut self, concurrency: usize) -> Self {
    self.worker_concurrency = concurrency;
    self
  }

  pub fn build(self) -> Result<PipelineConfig, ConfigError> {
    if self.min_inference_interval_ms < 0 {
      return Err(ConfigError::NegativeInterval(self.min_inference_interval_ms));
    }
    if !(0.0..=1.0).contains(&self.score_threshold) {
      // NaN 也落在这里
      return Err(ConfigError::ScoreThresholdOutOfRange(self.score_threshold));
    }
    if self.result_count == 0 {
      return Err(ConfigError::ZeroResultCount);
    }
    if self.worker_concurrency != WORKER_CONCURRENCY {
      return Err(ConfigError::UnsupportedConcurrency(self.worker_concurrency));
    }

    Ok(PipelineConfig {
      min_inference_interval_ms: self.min_inference_interval_ms as u64,
      score_threshold: self.score_threshold,
      result_count: self.result_count,
      worker_concurrency: self.worker_concurrency,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_builder() {
    assert_eq!(PipelineConfig::builder().build(), Ok(PipelineConfig::default()));
  }

  #[test]
  fn negative_interval_is_fatal() {
    let err = PipelineConfig::builder()
      .min_inference_interval_ms(-1)
      .build()
      .unwrap_err();
    assert_eq!(err, ConfigError::NegativeInterval(-1));
  }

  #[test]
  fn zero_interval_is_allowed() {
    let config = PipelineConfig::builder()
      .min_inference_interval_ms(0)
      .build()
      .unwrap();
    assert_eq!(config.min_inference_interval_ms(), 0);
  }

  #[test]
  fn threshold_must_be_unit_range() {
    for bad in [-0.1, 1.5, f32::NAN] {
      assert!(matches!(
        PipelineConfig::builder().score_threshold(bad).build(),
        Err(ConfigError::ScoreThresholdOutOfRange(_))
      ));
    }
    assert!(PipelineConfig::builder().score_threshold(1.0).build().is_ok());
  }

  #[test]
  fn rejects_zero_results_and_extra_workers() {
    assert_eq!(
      PipelineConfig::builder().result_count(0).build(),
      Err(ConfigError::ZeroResultCount)
    );
    assert_eq!(
      PipelineConfig::builder().worker_concurrency(2).build(),
      Err(ConfigError::UnsupportedConcurrency(2))
    );
  }
}
