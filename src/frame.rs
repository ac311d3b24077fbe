// 该文件是 Zhamen （闸门） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸无效: {width}x{height}")]
  InvalidShape { width: u32, height: u32 },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 一帧 RGB（NHWC 排列）图像
///
/// 像素缓冲区以 `Arc` 共享，克隆只增加引用计数；管线只读取，不修改。
#[derive(Debug, Clone)]
pub struct Frame {
  data: Arc<[u8]>,
  width: u32,
  height: u32,
  timestamp_ms: u64,
}

impl Frame {
  pub fn new(
    data: impl Into<Arc<[u8]>>,
    width: u32,
    height: u32,
    timestamp_ms: u64,
  ) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::InvalidShape { width, height });
    }

    let data = data.into();
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data,
      width,
      height,
      timestamp_ms,
    })
  }

  /// 纯色帧，主要用于测试和合成输入
  pub fn filled(rgb: [u8; 3], width: u32, height: u32, timestamp_ms: u64) -> Result<Self, FrameError> {
    let pixels = width as usize * height as usize;
    let data: Vec<u8> = rgb.iter().copied().cycle().take(pixels * RGB_CHANNELS).collect();
    Self::new(data, width, height, timestamp_ms)
  }

  /// 共享同一块像素缓冲区、换一个采集时间戳
  pub fn restamped(&self, timestamp_ms: u64) -> Self {
    Self {
      data: Arc::clone(&self.data),
      timestamp_ms,
      ..*self
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 采集时间戳（单调时钟，毫秒）
  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  pub fn pixels(&self) -> &[u8] {
    &self.data
  }
}

impl AsRef<[u8]> for Frame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

/// 以创建时刻为零点的毫秒单调时钟
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
  origin: Instant,
}

impl Default for MonotonicClock {
  fn default() -> Self {
    Self::new()
  }
}

impl MonotonicClock {
  pub fn new() -> Self {
    Self {
      origin: Instant::now(),
    }
  }

  pub fn now_ms(&self) -> u64 {
    self.origin.elapsed().as_millis() as u64
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = Frame::new(vec![0u8; 10], 2, 2, 0).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 10
      }
    );
  }

  #[test]
  fn rejects_empty_shape() {
    assert!(matches!(
      Frame::new(Vec::<u8>::new(), 0, 4, 0),
      Err(FrameError::InvalidShape { .. })
    ));
  }

  #[test]
  fn clone_shares_pixels() {
    let frame = Frame::filled([1, 2, 3], 4, 4, 7).unwrap();
    let copy = frame.clone();
    assert!(std::ptr::eq(frame.pixels(), copy.pixels()));
    assert_eq!(copy.timestamp_ms(), 7);
    assert_eq!(&copy.pixels()[..6], &[1, 2, 3, 1, 2, 3]);
  }
}
