// 该文件是 Zhamen （闸门） 项目的一部分。
// src/lib.rs - 库主文件
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

//! # Zhamen
//!
//! 摄像头帧准入与推理派发管线：
//!
//! 摄像头 → [`gate::AdmissionGate`] → [`dispatch::InferenceDispatcher`]
//! → [`model::Classifier`]（后台线程） → [`output::DeliveryContext`] → [`output::ResultSink`]
//!
//! 生产者线程永不阻塞，同一时刻最多一次推理，忙碌或过早的帧直接丢弃。

pub mod config;
pub mod dispatch;
pub mod frame;
pub mod gate;
pub mod input;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 查询参数中解析一个值，缺失时返回 `None`
pub(crate) fn query_value<T: std::str::FromStr>(url: &url::Url, key: &str) -> Option<Result<T, String>> {
  url
    .query_pairs()
    .find(|(k, _)| *k == key)
    .map(|(_, v)| v.parse::<T>().map_err(|_| v.into_owned()))
}
