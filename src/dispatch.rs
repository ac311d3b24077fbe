// 该文件是 Zhamen （闸门） 项目的一部分。
// src/dispatch.rs - 推理派发
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

//! # 推理派发
//!
//! 单个后台线程执行分类器。准入闸门已保证至多一帧在途，
//! 因此这里只是容量为 1 的直接交接，而不是工作队列。

use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  sync::mpsc::{self, Receiver, SyncSender, TrySendError},
  thread::{self, JoinHandle},
  time::Instant,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  config::PipelineConfig,
  frame::Frame,
  gate::InFlightPermit,
  model::{Classifier, InferenceResult},
  output::{DeliveryHandle, InferenceFailure, InferenceOutcome},
};

const WORKER_THREAD_NAME: &str = "inference-worker";

#[derive(Error, Debug)]
pub enum DispatchError {
  #[error("无法创建推理线程: {0}")]
  Spawn(std::io::Error),
  #[error("推理线程已退出")]
  WorkerGone,
  #[error("推理线程仍有未取走的帧")]
  Saturated,
  #[error("推理线程异常终止")]
  WorkerPanicked,
}

struct Job {
  frame: Frame,
  permit: InFlightPermit,
}

pub struct InferenceDispatcher {
  tx: Option<SyncSender<Job>>,
  worker: Option<JoinHandle<()>>,
}

impl InferenceDispatcher {
  pub fn spawn<C: Classifier>(
    classifier: C,
    config: &PipelineConfig,
    delivery: DeliveryHandle,
  ) -> Result<Self, DispatchError> {
    let (tx, rx) = mpsc::sync_channel(1);
    let ranking = Ranking {
      score_threshold: config.score_threshold(),
      result_count: config.result_count(),
    };

    info!("启动推理线程, 分类器: {}", classifier.name());
    let worker = thread::Builder::new()
      .name(WORKER_THREAD_NAME.to_string())
      .spawn(move || run_worker(classifier, ranking, rx, delivery))
      .map_err(DispatchError::Spawn)?;

    Ok(Self {
      tx: Some(tx),
      worker: Some(worker),
    })
  }

  /// 把已准入的帧交给推理线程，不阻塞
  ///
  /// 失败时许可随任务一起被释放，忙碌标志随之清除。
  pub fn submit(&self, permit: InFlightPermit, frame: Frame) -> Result<(), DispatchError> {
    let tx = self.tx.as_ref().ok_or(DispatchError::WorkerGone)?;
    match tx.try_send(Job { frame, permit }) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(_)) => Err(DispatchError::Saturated),
      Err(TrySendError::Disconnected(_)) => {
        error!("推理线程已退出, 无法提交帧");
        Err(DispatchError::WorkerGone)
      }
    }
  }

  /// 等待在途推理完成后退出推理线程
  pub fn shutdown(mut self) -> Result<(), DispatchError> {
    self.close()
  }

  fn close(&mut self) -> Result<(), DispatchError> {
    drop(self.tx.take());
    match self.worker.take() {
      Some(worker) => worker.join().map_err(|_| DispatchError::WorkerPanicked),
      None => Ok(()),
    }
  }
}

impl Drop for InferenceDispatcher {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      error!("推理线程退出异常: {}", e);
    }
  }
}

#[derive(Debug, Clone, Copy)]
struct Ranking {
  score_threshold: f32,
  result_count: usize,
}

fn run_worker<C: Classifier>(
  mut classifier: C,
  ranking: Ranking,
  rx: Receiver<Job>,
  delivery: DeliveryHandle,
) {
  for Job { frame, permit } in rx {
    let started = Instant::now();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(&frame))) {
      Ok(Ok(raw)) => Ok(InferenceResult::ranked(
        raw,
        ranking.score_threshold,
        ranking.result_count,
      )),
      Ok(Err(e)) => {
        warn!("帧 {} 分类失败: {}", frame.timestamp_ms(), e);
        Err(InferenceFailure::Classifier {
          classifier: classifier.name().to_string(),
          message: e.to_string(),
        })
      }
      Err(payload) => {
        let message = panic_message(payload.as_ref());
        error!("帧 {} 分类器异常终止: {}", frame.timestamp_ms(), message);
        Err(InferenceFailure::Panicked(message))
      }
    };
    debug!(
      "帧 {} (准入于 {}ms) 推理耗时: {:.2?}",
      frame.timestamp_ms(),
      permit.admitted_at_ms(),
      started.elapsed()
    );

    let outcome = InferenceOutcome {
      frame_timestamp_ms: frame.timestamp_ms(),
      width: frame.width(),
      height: frame.height(),
      result,
    };
    if delivery.send(outcome).is_err() {
      warn!("交付线程已关闭, 丢弃帧 {} 的结果", frame.timestamp_ms());
    }

    // 先交付再释放, 保证结果顺序与准入顺序一致
    drop(permit);
  }

  debug!("推理线程退出");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use crate::{
    gate::{Admission, AdmissionGate},
    model::Category,
    output::{ChannelSink, DeliveryContext},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("bad frame")]
  struct BadFrame;

  struct Scripted;

  impl Classifier for Scripted {
    type Error = BadFrame;

    fn name(&self) -> &str {
      "scripted"
    }

    fn classify(&mut self, frame: &Frame) -> Result<Vec<Category>, Self::Error> {
      match frame.timestamp_ms() {
        0 => Err(BadFrame),
        1 => panic!("exploded on frame 1"),
        _ => Ok(vec![Category::new("ok", 0.5), Category::new("low", 0.01)]),
      }
    }
  }

  fn admit(gate: &AdmissionGate, ts: u64) -> (InFlightPermit, Frame) {
    let frame = Frame::filled([9, 9, 9], 2, 2, ts).unwrap();
    match gate.offer(&frame, ts) {
      Admission::Admitted(permit) => (permit, frame),
      Admission::Dropped(reason) => panic!("frame {ts} dropped: {reason}"),
    }
  }

  fn wait_idle(gate: &AdmissionGate) {
    for _ in 0..500 {
      if !gate.is_busy() {
        return;
      }
      thread::sleep(Duration::from_millis(2));
    }
    panic!("gate stayed busy");
  }

  #[test]
  fn every_exit_path_releases_the_gate() {
    let config = PipelineConfig::builder()
      .min_inference_interval_ms(0)
      .build()
      .unwrap();
    let (sink, results) = ChannelSink::new();
    let delivery = DeliveryContext::spawn("test-delivery", sink).unwrap();
    let dispatcher = InferenceDispatcher::spawn(Scripted, &config, delivery.handle().unwrap()).unwrap();
    let gate = AdmissionGate::new(0);

    for ts in 0..3 {
      let (permit, frame) = admit(&gate, ts);
      dispatcher.submit(permit, frame).unwrap();
      wait_idle(&gate);
    }

    dispatcher.shutdown().unwrap();
    delivery.join().unwrap();

    let outcomes: Vec<_> = results.try_iter().collect();
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(
      &outcomes[0].result,
      Err(InferenceFailure::Classifier { classifier, .. }) if classifier == "scripted"
    ));
    assert!(matches!(
      &outcomes[1].result,
      Err(InferenceFailure::Panicked(message)) if message.contains("exploded")
    ));
    let ok = outcomes[2].result.as_ref().unwrap();
    assert_eq!(ok.len(), 1);
    assert_eq!(ok.top().unwrap().label, "ok");
  }

  #[test]
  fn submit_after_shutdown_clears_busy() {
    let config = PipelineConfig::default();
    let (sink, _results) = ChannelSink::new();
    let delivery = DeliveryContext::spawn("test-delivery", sink).unwrap();
    let mut dispatcher = InferenceDispatcher::spawn(Scripted, &config, delivery.handle().unwrap()).unwrap();
    dispatcher.close().unwrap();

    let gate = AdmissionGate::new(0);
    let (permit, frame) = admit(&gate, 5);
    assert!(matches!(
      dispatcher.submit(permit, frame),
      Err(DispatchError::WorkerGone)
    ));
    assert!(!gate.is_busy());
  }
}
