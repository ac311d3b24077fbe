// 该文件是 Zhamen （闸门） 项目的一部分。
// src/input/pacer.rs - 帧率控制
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
  thread,
  time::{Duration, Instant},
};

use crate::frame::MonotonicClock;

/// 模拟传感器节奏：第 n 帧不早于 `start + n / fps` 交出
#[derive(Debug)]
pub(crate) struct Pacer {
  clock: MonotonicClock,
  period: Option<Duration>,
  next_deadline: Option<Instant>,
  remaining: Option<u64>,
}

impl Pacer {
  /// `fps == 0` 表示不限速；`frames == None` 表示无限帧
  pub(crate) fn new(fps: u32, frames: Option<u64>) -> Self {
    Self {
      clock: MonotonicClock::new(),
      period: (fps > 0).then(|| Duration::from_secs(1) / fps),
      next_deadline: None,
      remaining: frames,
    }
  }

  /// 等到下一帧的时刻，返回其采集时间戳；帧数用完时返回 `None`
  pub(crate) fn tick(&mut self) -> Option<u64> {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        return None;
      }
      *remaining -= 1;
    }

    if let Some(period) = self.period {
      let now = Instant::now();
      let deadline = *self.next_deadline.get_or_insert(now);
      if deadline > now {
        thread::sleep(deadline - now);
      }
      self.next_deadline = Some(deadline + period);
    }

    Some(self.clock.now_ms())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stops_after_frame_budget() {
    let mut pacer = Pacer::new(0, Some(2));
    assert!(pacer.tick().is_some());
    assert!(pacer.tick().is_some());
    assert!(pacer.tick().is_none());
  }

  #[test]
  fn timestamps_follow_frame_rate() {
    let mut pacer = Pacer::new(100, Some(4));
    let stamps: Vec<u64> = std::iter::from_fn(|| pacer.tick()).collect();
    assert_eq!(stamps.len(), 4);
    assert!(stamps.windows(2).all(|w| w[1] >= w[0]));
    assert!(stamps[3] - stamps[0] >= 29);
  }
}
