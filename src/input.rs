// 该文件是 Zhamen （闸门） 项目的一部分。
// src/input.rs - 摄像头/图像输入
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

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod pacer;
mod synthetic;
pub use self::synthetic::{SyntheticCamera, SyntheticCameraError};

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileCamera, ImageFileCameraError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Synthetic camera error: {0}")]
  SyntheticCameraError(#[from] SyntheticCameraError),
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileCameraError(#[from] ImageFileCameraError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

/// 按采集速率产出 [`Frame`] 的输入源
pub enum InputWrapper {
  Synthetic(SyntheticCamera),
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileCamera),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SyntheticCamera::SCHEME => Ok(InputWrapper::Synthetic(SyntheticCamera::from_url(url)?)),
      #[cfg(feature = "read_image_file")]
      ImageFileCamera::SCHEME => Ok(InputWrapper::ImageFile(ImageFileCamera::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::Synthetic(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wrapper_dispatches_on_scheme() {
    let url = url::Url::parse("synthetic://?width=2&height=2&fps=0&frames=3").unwrap();
    let input = InputWrapper::from_url(&url).unwrap();
    assert!(matches!(input, InputWrapper::Synthetic(_)));
    assert_eq!(input.count(), 3);

    let url = url::Url::parse("v4l:///dev/video0").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(scheme)) if scheme == "v4l"
    ));
  }
}
