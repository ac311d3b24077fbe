// 该文件是 Zhamen （闸门） 项目的一部分。
// src/gate.rs - 帧准入闸门
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

//! # 帧准入闸门
//!
//! 对每一帧做两项独立否决：
//! 1. 距上一次*准入*不足 `min_inference_interval_ms` → [`DropReason::TooSoon`]
//! 2. 已有推理在进行中 → [`DropReason::Busy`]
//!
//! 两项检查与状态更新在同一把锁内完成，临界区只有几次比较和赋值。
//! 准入后返回 [`InFlightPermit`]，许可被释放（正常结束、出错、panic 展开、
//! 或者从未提交）时自动清除忙碌标志。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::frame::Frame;

/// 丢帧原因，属于有损管线的正常结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
  /// 距上一次准入时间过短
  TooSoon,
  /// 上一帧仍在推理
  Busy,
}

impl std::fmt::Display for DropReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      DropReason::TooSoon => write!(f, "too-soon"),
      DropReason::Busy => write!(f, "busy"),
    }
  }
}

#[derive(Debug, Default)]
struct PipelineState {
  /// `None` 表示从未准入过，相当于负无穷
  last_admitted_timestamp_ms: Option<u64>,
  inference_in_flight: bool,
}

#[derive(Debug)]
struct GateShared {
  min_inference_interval_ms: u64,
  state: Mutex<PipelineState>,
}

impl GateShared {
  // 状态只有两个标量，毒化后数据依旧一致
  fn lock(&self) -> MutexGuard<'_, PipelineState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// 帧准入闸门，可在线程间共享（内部为 `Arc`）
#[derive(Debug, Clone)]
pub struct AdmissionGate {
  shared: Arc<GateShared>,
}

/// `offer` 的结果
#[derive(Debug)]
#[must_use = "丢弃准入许可会立即清除忙碌标志"]
pub enum Admission {
  Admitted(InFlightPermit),
  Dropped(DropReason),
}

impl Admission {
  pub fn is_admitted(&self) -> bool {
    matches!(self, Admission::Admitted(_))
  }

  pub fn drop_reason(&self) -> Option<DropReason> {
    match self {
      Admission::Admitted(_) => None,
      Admission::Dropped(reason) => Some(*reason),
    }
  }
}

impl AdmissionGate {
  pub fn new(min_inference_interval_ms: u64) -> Self {
    Self {
      shared: Arc::new(GateShared {
        min_inference_interval_ms,
        state: Mutex::new(PipelineState::default()),
      }),
    }
  }

  pub fn min_inference_interval_ms(&self) -> u64 {
    self.shared.min_inference_interval_ms
  }

  /// 判断一帧是否进入推理，O(1)，从不等待推理完成
  ///
  /// 早于上一次准入时间戳的 `now_ms` 视为 `TooSoon`，
  /// 保证 `last_admitted_timestamp_ms` 单调不减。
  pub fn offer(&self, frame: &Frame, now_ms: u64) -> Admission {
    let mut state = self.shared.lock();

    if let Some(last) = state.last_admitted_timestamp_ms {
      let too_soon = match now_ms.checked_sub(last) {
        Some(elapsed) => elapsed < self.shared.min_inference_interval_ms,
        None => true,
      };
      if too_soon {
        trace!("丢弃帧 {}: 距上次准入 {}ms", frame.timestamp_ms(), now_ms.wrapping_sub(last));
        return Admission::Dropped(DropReason::TooSoon);
      }
    }

    if state.inference_in_flight {
      trace!("丢弃帧 {}: 推理进行中", frame.timestamp_ms());
      return Admission::Dropped(DropReason::Busy);
    }

    state.inference_in_flight = true;
    state.last_admitted_timestamp_ms = Some(now_ms);
    drop(state);

    Admission::Admitted(InFlightPermit {
      shared: Arc::clone(&self.shared),
      admitted_at_ms: now_ms,
    })
  }

  pub fn is_busy(&self) -> bool {
    self.shared.lock().inference_in_flight
  }

  pub fn last_admitted_ms(&self) -> Option<u64> {
    self.shared.lock().last_admitted_timestamp_ms
  }
}

/// 一次准入对应的在途许可
///
/// 同一时刻至多存在一个；`Drop` 时清除忙碌标志。
#[derive(Debug)]
pub struct InFlightPermit {
  shared: Arc<GateShared>,
  admitted_at_ms: u64,
}

impl InFlightPermit {
  pub fn admitted_at_ms(&self) -> u64 {
    self.admitted_at_ms
  }
}

impl Drop for InFlightPermit {
  fn drop(&mut self) {
    self.shared.lock().inference_in_flight = false;
  }
}
