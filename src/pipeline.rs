// 该文件是 Zhamen （闸门） 项目的一部分。
// src/pipeline.rs - 分类管线
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

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::PipelineConfig,
  dispatch::{DispatchError, InferenceDispatcher},
  frame::Frame,
  gate::{Admission, AdmissionGate, DropReason},
  model::Classifier,
  output::{DeliveryContext, DeliveryError, InferenceOutcome, ResultSink},
};

const DELIVERY_THREAD_NAME: &str = "result-delivery";

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("派发错误: {0}")]
  Dispatch(#[from] DispatchError),
  #[error("交付错误: {0}")]
  Delivery(#[from] DeliveryError),
}

/// 单帧处理决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
  Admitted,
  Dropped(DropReason),
  /// 已准入但推理线程不可用
  Rejected,
}

#[derive(Debug, Default)]
struct Counters {
  offered: AtomicU64,
  admitted: AtomicU64,
  dropped_too_soon: AtomicU64,
  dropped_busy: AtomicU64,
  rejected: AtomicU64,
  completed: AtomicU64,
  failed: AtomicU64,
}

impl Counters {
  fn snapshot(&self) -> PipelineStats {
    PipelineStats {
      offered: self.offered.load(Ordering::Relaxed),
      admitted: self.admitted.load(Ordering::Relaxed),
      dropped_too_soon: self.dropped_too_soon.load(Ordering::Relaxed),
      dropped_busy: self.dropped_busy.load(Ordering::Relaxed),
      rejected: self.rejected.load(Ordering::Relaxed),
      completed: self.completed.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
  pub offered: u64,
  pub admitted: u64,
  pub dropped_too_soon: u64,
  pub dropped_busy: u64,
  pub rejected: u64,
  pub completed: u64,
  pub failed: u64,
}

impl std::fmt::Display for PipelineStats {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "输入 {} 帧, 准入 {}, 过早丢弃 {}, 忙碌丢弃 {}, 拒绝 {}, 成功 {}, 失败 {}",
      self.offered,
      self.admitted,
      self.dropped_too_soon,
      self.dropped_busy,
      self.rejected,
      self.completed,
      self.failed
    )
  }
}

/// 在交付线程上统计结果，再转交真正的接收端
struct CountingSink<S> {
  inner: S,
  counters: Arc<Counters>,
}

impl<S: ResultSink> ResultSink for CountingSink<S> {
  type Error = S::Error;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
    let counter = if outcome.is_success() {
      &self.counters.completed
    } else {
      &self.counters.failed
    };
    counter.fetch_add(1, Ordering::Relaxed);
    self.inner.deliver(outcome)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    self.inner.finish()
  }
}

/// 准入闸门 + 推理派发 + 结果交付
///
/// 未调用 [`Self::shutdown`] 直接丢弃时，仍按先推理线程、后交付线程的顺序等待退出，
/// 接收端的 `finish` 会执行，但接收端本身被丢弃。
///
/// ```no_run
/// use zhamen::{
///   config::PipelineConfig, frame::Frame, model::StubClassifier,
///   output::LogSink, pipeline::ClassificationPipeline,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ClassificationPipeline::new(
///   PipelineConfig::default(),
///   StubClassifier::default(),
///   LogSink::default(),
/// )?;
/// let frame = Frame::filled([200, 30, 30], 224, 224, 0)?;
/// pipeline.on_frame(frame, 0);
/// let _sink = pipeline.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct ClassificationPipeline<S: ResultSink> {
  config: PipelineConfig,
  gate: AdmissionGate,
  dispatcher: InferenceDispatcher,
  delivery: DeliveryContext<CountingSink<S>>,
  counters: Arc<Counters>,
}

impl<S: ResultSink> ClassificationPipeline<S> {
  pub fn new<C: Classifier>(
    config: PipelineConfig,
    classifier: C,
    sink: S,
  ) -> Result<Self, PipelineError> {
    let counters = Arc::new(Counters::default());
    let delivery = DeliveryContext::spawn(
      DELIVERY_THREAD_NAME,
      CountingSink {
        inner: sink,
        counters: Arc::clone(&counters),
      },
    )?;
    let dispatcher = InferenceDispatcher::spawn(classifier, &config, delivery.handle()?)?;
    let gate = AdmissionGate::new(config.min_inference_interval_ms());

    info!(
      "管线启动: 最小间隔 {}ms, 阈值 {}, 结果数 {}",
      config.min_inference_interval_ms(),
      config.score_threshold(),
      config.result_count()
    );

    Ok(Self {
      config,
      gate,
      dispatcher,
      delivery,
      counters,
    })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn gate(&self) -> &AdmissionGate {
    &self.gate
  }

  /// 生产者回调：决定是否推理这一帧，立即返回
  pub fn on_frame(&self, frame: Frame, now_ms: u64) -> FrameDecision {
    self.counters.offered.fetch_add(1, Ordering::Relaxed);

    match self.gate.offer(&frame, now_ms) {
      Admission::Dropped(reason) => {
        let counter = match reason {
          DropReason::TooSoon => &self.counters.dropped_too_soon,
          DropReason::Busy => &self.counters.dropped_busy,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        FrameDecision::Dropped(reason)
      }
      Admission::Admitted(permit) => {
        debug!("准入帧 {} (now = {}ms)", frame.timestamp_ms(), now_ms);
        match self.dispatcher.submit(permit, frame) {
          Ok(()) => {
            self.counters.admitted.fetch_add(1, Ordering::Relaxed);
            FrameDecision::Admitted
          }
          Err(_) => {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            FrameDecision::Rejected
          }
        }
      }
    }
  }

  pub fn stats(&self) -> PipelineStats {
    self.counters.snapshot()
  }

  /// 等待在途推理与结果交付完成，归还接收端
  pub fn shutdown(self) -> Result<S, PipelineError> {
    let ClassificationPipeline {
      dispatcher,
      delivery,
      ..
    } = self;
    dispatcher.shutdown()?;
    let sink = delivery.join()?;
    Ok(sink.inner)
  }

  /// [`Self::shutdown`] 并返回最终统计
  pub fn shutdown_with_stats(self) -> Result<(S, PipelineStats), PipelineError> {
    let counters = Arc::clone(&self.counters);
    let sink = self.shutdown()?;
    Ok((sink, counters.snapshot()))
  }
}
