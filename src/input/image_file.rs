// 该文件是 Zhamen （闸门） 项目的一部分。
// src/input/image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError},
  input::pacer::Pacer,
  query_value,
};

const DEFAULT_FPS: u32 = 30;

#[derive(Error, Debug)]
pub enum ImageFileCameraError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Frame error: {0}")]
  FrameError(#[from] FrameError),
  #[error("Invalid parameter {key}: {value}")]
  InvalidParameter { key: &'static str, value: String },
}

/// 以固定帧率重复同一张图片，模拟对着静止场景的摄像头
///
/// `image:///path/to/cat.jpg?fps=30&frames=90`
pub struct ImageFileCamera {
  template: Frame,
  pacer: Pacer,
}

impl FromUrlWithScheme for ImageFileCamera {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileCamera {
  type Error = ImageFileCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileCameraError::SchemaMismatch);
    }

    let fps = match query_value::<u32>(url, "fps") {
      Some(Ok(v)) => v,
      Some(Err(value)) => return Err(ImageFileCameraError::InvalidParameter { key: "fps", value }),
      None => DEFAULT_FPS,
    };
    let frames = match query_value::<u64>(url, "frames") {
      Some(Ok(v)) => Some(v),
      Some(Err(value)) => {
        return Err(ImageFileCameraError::InvalidParameter {
          key: "frames",
          value,
        });
      }
      None => None,
    };

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    let (width, height) = image.dimensions();
    info!("图片输入: {} ({}x{}) @ {}fps", path, width, height, fps);

    Ok(ImageFileCamera {
      template: Frame::new(image.into_raw(), width, height, 0)?,
      pacer: Pacer::new(fps, frames),
    })
  }
}

impl Iterator for ImageFileCamera {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let timestamp_ms = self.pacer.tick()?;
    Some(self.template.restamped(timestamp_ms))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn repeats_image_with_shared_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("red.png");
    image::RgbImage::from_pixel(3, 2, image::Rgb([255, 0, 0]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}?fps=0&frames=3", path.display())).unwrap();
    let frames: Vec<Frame> = ImageFileCamera::from_url(&url).unwrap().collect();
    assert_eq!(frames.len(), 3);
    assert_eq!((frames[0].width(), frames[0].height()), (3, 2));
    assert!(std::ptr::eq(frames[0].pixels(), frames[2].pixels()));
  }
}
