// 该文件是 Zhamen （闸门） 项目的一部分。
// src/output/delivery.rs - 结果交付线程
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

use std::{
  sync::mpsc::{self, Receiver, SyncSender},
  thread::{self, JoinHandle},
};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::output::{InferenceOutcome, ResultSink};

#[derive(Error, Debug)]
pub enum DeliveryError {
  #[error("无法创建交付线程 {name}: {source}")]
  Spawn {
    name: String,
    source: std::io::Error,
  },
  #[error("交付线程已退出")]
  Closed,
  #[error("交付线程 {0} 异常终止")]
  Panicked(String),
}

/// 向交付线程投递结果的句柄，可克隆
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
  tx: SyncSender<InferenceOutcome>,
}

impl DeliveryHandle {
  /// 阻塞直到交付线程取走结果
  ///
  /// 通道容量为 0：接收端慢时，调用方（推理线程）停在这里，不会积压结果。
  pub fn send(&self, outcome: InferenceOutcome) -> Result<(), DeliveryError> {
    self.tx.send(outcome).map_err(|_| DeliveryError::Closed)
  }
}

/// 一个具名的交付线程，独占 [`ResultSink`]
///
/// 推理线程只负责投递消息，接收端的所有调用都发生在这里。
/// 未调用 [`Self::join`] 就被丢弃时同样会等待线程结束，`finish` 总会执行。
pub struct DeliveryContext<S: ResultSink> {
  name: String,
  handle: Option<DeliveryHandle>,
  thread: Option<JoinHandle<S>>,
}

impl<S: ResultSink> DeliveryContext<S> {
  pub fn spawn(name: impl Into<String>, sink: S) -> Result<Self, DeliveryError> {
    let name = name.into();
    let (tx, rx) = mpsc::sync_channel(0);

    let thread = thread::Builder::new()
      .name(name.clone())
      .spawn(move || run_delivery(sink, rx))
      .map_err(|source| DeliveryError::Spawn {
        name: name.clone(),
        source,
      })?;

    Ok(Self {
      name,
      handle: Some(DeliveryHandle { tx }),
      thread: Some(thread),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn handle(&self) -> Result<DeliveryHandle, DeliveryError> {
    self.handle.clone().ok_or(DeliveryError::Closed)
  }

  /// 处理完剩余结果后归还接收端
  ///
  /// 所有 [`DeliveryHandle`] 被释放之后才会返回。
  pub fn join(mut self) -> Result<S, DeliveryError> {
    self.close()?.ok_or(DeliveryError::Closed)
  }

  fn close(&mut self) -> Result<Option<S>, DeliveryError> {
    drop(self.handle.take());
    match self.thread.take() {
      Some(thread) => thread
        .join()
        .map(Some)
        .map_err(|_| DeliveryError::Panicked(self.name.clone())),
      None => Ok(None),
    }
  }
}

impl<S: ResultSink> Drop for DeliveryContext<S> {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      error!("交付线程退出异常: {}", e);
    }
  }
}

fn run_delivery<S: ResultSink>(mut sink: S, rx: Receiver<InferenceOutcome>) -> S {
  for outcome in rx {
    debug!("交付帧 {} 的推理结果", outcome.frame_timestamp_ms);
    if let Err(e) = sink.deliver(&outcome) {
      warn!("结果交付失败 (帧 {}): {}", outcome.frame_timestamp_ms, e);
    }
  }

  if let Err(e) = sink.finish() {
    error!("结果输出收尾失败: {}", e);
  }
  sink
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  };

  use super::*;
  use crate::model::InferenceResult;

  #[derive(Debug, thiserror::Error)]
  #[error("odd frame {0}")]
  struct OddFrame(u64);

  /// 记录收到的帧，奇数时间戳返回错误
  struct RecordingSink {
    seen: Arc<Mutex<Vec<u64>>>,
    finished: Arc<AtomicBool>,
  }

  impl ResultSink for RecordingSink {
    type Error = OddFrame;

    fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
      self.seen.lock().unwrap().push(outcome.frame_timestamp_ms);
      if outcome.frame_timestamp_ms % 2 == 1 {
        return Err(OddFrame(outcome.frame_timestamp_ms));
      }
      Ok(())
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
      self.finished.store(true, Ordering::SeqCst);
      Ok(())
    }
  }

  fn outcome(ts: u64) -> InferenceOutcome {
    InferenceOutcome {
      frame_timestamp_ms: ts,
      width: 1,
      height: 1,
      result: Ok(InferenceResult::ranked(Vec::new(), 0.0, 1)),
    }
  }

  fn recording() -> (RecordingSink, Arc<Mutex<Vec<u64>>>, Arc<AtomicBool>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let finished = Arc::new(AtomicBool::new(false));
    let sink = RecordingSink {
      seen: Arc::clone(&seen),
      finished: Arc::clone(&finished),
    };
    (sink, seen, finished)
  }

  #[test]
  fn sink_errors_do_not_stop_delivery() {
    let (sink, seen, finished) = recording();
    let context = DeliveryContext::spawn("test-delivery", sink).unwrap();
    let handle = context.handle().unwrap();
    for ts in 0..6 {
      handle.send(outcome(ts)).unwrap();
    }
    drop(handle);

    context.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), [0, 1, 2, 3, 4, 5]);
    assert!(finished.load(Ordering::SeqCst));
  }

  #[test]
  fn dropping_context_still_finishes_sink() {
    let (sink, seen, finished) = recording();
    let context = DeliveryContext::spawn("test-delivery", sink).unwrap();
    assert_eq!(context.name(), "test-delivery");
    context.handle().unwrap().send(outcome(8)).unwrap();

    drop(context);
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(*seen.lock().unwrap(), [8]);
  }
}
