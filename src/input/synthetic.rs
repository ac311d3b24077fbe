// 该文件是 Zhamen （闸门） 项目的一部分。
// src/input/synthetic.rs - 合成测试图案输入
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
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::pacer::Pacer, query_value};

const DEFAULT_WIDTH: u32 = 224;
const DEFAULT_HEIGHT: u32 = 224;
const DEFAULT_FPS: u32 = 30;
// 依次循环的纯色，每种颜色持续一秒左右
const PALETTE: [[u8; 3]; 4] = [[220, 40, 40], [40, 200, 60], [30, 60, 210], [20, 20, 20]];

#[derive(Error, Debug)]
pub enum SyntheticCameraError {
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("Invalid parameter {key}: {value}")]
  InvalidParameter { key: &'static str, value: String },
}

/// 无需硬件的摄像头替身
///
/// `synthetic://?width=224&height=224&fps=30&frames=300`
#[derive(Debug)]
pub struct SyntheticCamera {
  width: u32,
  height: u32,
  fps: u32,
  pacer: Pacer,
  index: u64,
}

impl FromUrlWithScheme for SyntheticCamera {
  const SCHEME: &'static str = "synthetic";
}

impl FromUrl for SyntheticCamera {
  type Error = SyntheticCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(SyntheticCameraError::SchemeMismatch);
    }

    fn param<T: std::str::FromStr>(
      url: &Url,
      key: &'static str,
      default: T,
    ) -> Result<T, SyntheticCameraError> {
      match query_value::<T>(url, key) {
        Some(Ok(v)) => Ok(v),
        Some(Err(value)) => Err(SyntheticCameraError::InvalidParameter { key, value }),
        None => Ok(default),
      }
    }

    let width = param(url, "width", DEFAULT_WIDTH)?;
    let height = param(url, "height", DEFAULT_HEIGHT)?;
    if width == 0 || height == 0 {
      return Err(SyntheticCameraError::InvalidParameter {
        key: "width/height",
        value: format!("{}x{}", width, height),
      });
    }
    let fps = param(url, "fps", DEFAULT_FPS)?;
    let frames = match query_value::<u64>(url, "frames") {
      Some(Ok(v)) => Some(v),
      Some(Err(value)) => return Err(SyntheticCameraError::InvalidParameter { key: "frames", value }),
      None => None,
    };

    Ok(Self::new(width, height, fps, frames))
  }
}

impl SyntheticCamera {
  pub fn new(width: u32, height: u32, fps: u32, frames: Option<u64>) -> Self {
    info!("合成输入: {}x{} @ {}fps, 帧数 {:?}", width, height, fps, frames);
    Self {
      width,
      height,
      fps,
      pacer: Pacer::new(fps, frames),
      index: 0,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  fn colour(&self) -> [u8; 3] {
    let per_colour = self.fps.max(1) as u64;
    PALETTE[((self.index / per_colour) % PALETTE.len() as u64) as usize]
  }
}

impl Iterator for SyntheticCamera {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let timestamp_ms = self.pacer.tick()?;
    let colour = self.colour();
    self.index += 1;

    match Frame::filled(colour, self.width, self.height, timestamp_ms) {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("生成合成帧失败: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yields_requested_frames() {
    let url = Url::parse("synthetic://?width=8&height=4&fps=0&frames=5").unwrap();
    let frames: Vec<Frame> = SyntheticCamera::from_url(&url).unwrap().collect();
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|f| f.width() == 8 && f.height() == 4));
    assert!(frames.windows(2).all(|w| w[1].timestamp_ms() >= w[0].timestamp_ms()));
  }

  #[test]
  fn rejects_bad_parameters() {
    let url = Url::parse("synthetic://?fps=fast").unwrap();
    assert!(matches!(
      SyntheticCamera::from_url(&url),
      Err(SyntheticCameraError::InvalidParameter { key: "fps", .. })
    ));
    let url = Url::parse("synthetic://?width=0").unwrap();
    assert!(SyntheticCamera::from_url(&url).is_err());
  }
}
