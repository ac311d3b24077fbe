// 该文件是 Zhamen （闸门） 项目的一部分。
// src/task.rs - 推理任务
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
  config::PipelineConfig,
  frame::Frame,
  model::Classifier,
  output::ResultSink,
  pipeline::{ClassificationPipeline, FrameDecision, PipelineStats},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 把输入源的每一帧交给管线，直到输入耗尽、达到帧数或收到中断
#[derive(Debug)]
pub struct ContinuousTask {
  config: PipelineConfig,
  frame_number: Option<usize>,
  interrupt: Option<Arc<AtomicBool>>,
}

impl ContinuousTask {
  pub fn new(config: PipelineConfig) -> Self {
    Self {
      config,
      frame_number: None,
      interrupt: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 使用外部中断标志；未设置时安装 Ctrl-C 处理器
  pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn install_ctrlc() -> anyhow::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_flag.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(flag)
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = Frame>,
  M: Classifier,
  O: ResultSink,
{
  type Output = (O, PipelineStats);
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let interrupt = match self.interrupt {
      Some(flag) => flag,
      None => Self::install_ctrlc()?,
    };
    let pipeline = ClassificationPipeline::new(self.config, model, output)?;

    let mut frame_index = 0usize;
    for frame in input {
      frame_index += 1;
      let now_ms = frame.timestamp_ms();
      match pipeline.on_frame(frame, now_ms) {
        FrameDecision::Admitted => debug!("第 {} 帧进入推理", frame_index),
        FrameDecision::Dropped(reason) => debug!("第 {} 帧丢弃: {}", frame_index, reason),
        FrameDecision::Rejected => {
          warn!("推理线程不可用，退出任务循环");
          break;
        }
      }
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    let (sink, stats) = pipeline.shutdown_with_stats()?;
    info!("任务完成: {}", stats);
    Ok((sink, stats))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{input::SyntheticCamera, model::StubClassifier, output::ChannelSink};

  fn task(frame_number: Option<usize>, interrupted: bool) -> ContinuousTask {
    let config = PipelineConfig::builder()
      .min_inference_interval_ms(0)
      .build()
      .unwrap();
    ContinuousTask::new(config)
      .with_frame_number(frame_number)
      .with_interrupt(Arc::new(AtomicBool::new(interrupted)))
  }

  #[test]
  fn stops_at_frame_number() {
    let (sink, results) = ChannelSink::new();
    let camera = SyntheticCamera::new(4, 4, 0, Some(50));
    let (_, stats) = task(Some(20), false)
      .run_task(camera, StubClassifier::default(), sink)
      .unwrap();

    assert_eq!(stats.offered, 20);
    assert!(stats.admitted >= 1);
    assert_eq!(
      stats.admitted + stats.dropped_too_soon + stats.dropped_busy,
      stats.offered
    );
    assert_eq!(stats.completed, stats.admitted);
    assert_eq!(results.try_iter().count() as u64, stats.admitted);
  }

  #[test]
  fn stops_when_input_runs_out() {
    let (sink, _results) = ChannelSink::new();
    let camera = SyntheticCamera::new(4, 4, 0, Some(5));
    let (_, stats) = task(None, false)
      .run_task(camera, StubClassifier::default(), sink)
      .unwrap();
    assert_eq!(stats.offered, 5);
  }

  #[test]
  fn interrupt_ends_the_loop() {
    let (sink, results) = ChannelSink::new();
    let camera = SyntheticCamera::new(4, 4, 0, None);
    let (_, stats) = task(None, true)
      .run_task(camera, StubClassifier::default(), sink)
      .unwrap();

    assert_eq!(stats.offered, 1);
    assert_eq!(stats.admitted, 1);
    assert_eq!(results.try_iter().count(), 1);
  }
}
