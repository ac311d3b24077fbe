// 该文件是 Zhamen （闸门） 项目的一部分。
// src/output/channel_sink.rs - 通道输出
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

use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

use crate::output::{InferenceOutcome, ResultSink};

#[derive(Error, Debug)]
#[error("结果接收方已关闭")]
pub struct ChannelSinkError;

/// 把结果转发给调用方持有的 `Receiver`，便于嵌入其他事件循环
#[derive(Debug, Clone)]
pub struct ChannelSink {
  tx: Sender<InferenceOutcome>,
}

impl ChannelSink {
  pub fn new() -> (Self, Receiver<InferenceOutcome>) {
    let (tx, rx) = mpsc::channel();
    (Self { tx }, rx)
  }
}

impl ResultSink for ChannelSink {
  type Error = ChannelSinkError;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
    self.tx.send(outcome.clone()).map_err(|_| ChannelSinkError)
  }
}
