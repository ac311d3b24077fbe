// 该文件是 Zhamen （闸门） 项目的一部分。
// src/model.rs - 分类模型
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

/// 图像分类器
///
/// 同步调用，耗时不受管线控制。管线保证只在一个后台线程上调用，
/// 且不会并发调用。
pub trait Classifier: Send + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn name(&self) -> &str;

  /// 返回未排序的 (标签, 置信度) 列表，排序与截断由管线完成
  fn classify(&mut self, frame: &Frame) -> Result<Vec<Category>, Self::Error>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
  type Error = C::Error;

  fn name(&self) -> &str {
    (**self).name()
  }

  fn classify(&mut self, frame: &Frame) -> Result<Vec<Category>, Self::Error> {
    (**self).classify(frame)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
  pub label: String,
  pub score: f32,
}

impl Category {
  pub fn new(label: impl Into<String>, score: f32) -> Self {
    Self {
      label: label.into(),
      score,
    }
  }
}

/// 按置信度降序排列的分类结果，可以为空
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceResult {
  categories: Box<[Category]>,
}

impl InferenceResult {
  /// 过滤、排序并截断分类器的原始输出
  ///
  /// 非有限值或超出 [0, 1] 的置信度被丢弃；同分保持原始顺序。
  pub fn ranked(raw: Vec<Category>, score_threshold: f32, result_count: usize) -> Self {
    let mut categories: Vec<Category> = raw
      .into_iter()
      .filter(|c| (0.0..=1.0).contains(&c.score) && c.score >= score_threshold)
      .collect();
    categories.sort_by(|a, b| b.score.total_cmp(&a.score));
    categories.truncate(result_count);

    Self {
      categories: categories.into_boxed_slice(),
    }
  }

  pub fn top(&self) -> Option<&Category> {
    self.categories.first()
  }

  pub fn is_empty(&self) -> bool {
    self.categories.is_empty()
  }

  pub fn len(&self) -> usize {
    self.categories.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Category> {
    self.categories.iter()
  }
}

impl<'a> IntoIterator for &'a InferenceResult {
  type Item = &'a Category;
  type IntoIter = std::slice::Iter<'a, Category>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

mod stub;
pub use self::stub::{StubClassifier, StubClassifierError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("Stub 分类器错误: {0}")]
  StubClassifierError(#[from] StubClassifierError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ClassifierWrapper {
  Stub(StubClassifier),
}

impl FromUrl for ClassifierWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      StubClassifier::SCHEME => Ok(ClassifierWrapper::Stub(StubClassifier::from_url(url)?)),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Classifier for ClassifierWrapper {
  type Error = ModelError;

  fn name(&self) -> &str {
    match self {
      ClassifierWrapper::Stub(classifier) => classifier.name(),
    }
  }

  fn classify(&mut self, frame: &Frame) -> Result<Vec<Category>, Self::Error> {
    match self {
      ClassifierWrapper::Stub(classifier) => classifier.classify(frame).map_err(ModelError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ranked_sorts_filters_and_truncates() {
    let raw = vec![
      Category::new("cat", 0.3),
      Category::new("dog", 0.9),
      Category::new("noise", 0.05),
      Category::new("bird", 0.6),
      Category::new("fish", 0.4),
    ];
    let result = InferenceResult::ranked(raw, 0.2, 3);
    let labels: Vec<&str> = result.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["dog", "bird", "fish"]);
    assert_eq!(result.top().map(|c| c.score), Some(0.9));
  }

  #[test]
  fn ranked_drops_invalid_scores() {
    let raw = vec![
      Category::new("nan", f32::NAN),
      Category::new("big", 1.2),
      Category::new("neg", -0.1),
      Category::new("ok", 1.0),
    ];
    let result = InferenceResult::ranked(raw, 0.0, 10);
    assert_eq!(result.len(), 1);
    assert_eq!(result.top().unwrap().label, "ok");
  }

  #[test]
  fn wrapper_dispatches_on_scheme() {
    let url = Url::parse("stub://?latency_ms=0").unwrap();
    let classifier = ClassifierWrapper::from_url(&url).unwrap();
    assert!(matches!(classifier, ClassifierWrapper::Stub(_)));

    let url = Url::parse("onnx:///models/mobilenet.onnx").unwrap();
    assert!(matches!(
      ClassifierWrapper::from_url(&url),
      Err(ModelError::SchemeMismatch(scheme)) if scheme == "onnx"
    ));
  }

  #[test]
  fn ranked_may_be_empty() {
    let result = InferenceResult::ranked(vec![Category::new("low", 0.1)], 0.5, 3);
    assert!(result.is_empty());
    assert!(result.top().is_none());
  }
}
