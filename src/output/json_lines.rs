// 该文件是 Zhamen （闸门） 项目的一部分。
// src/output/json_lines.rs - JSON Lines 结果记录
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
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{InferenceOutcome, ResultSink},
};

#[derive(Error, Debug)]
pub enum JsonLinesSinkError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每个推理结论写一行 JSON
///
/// `jsonl:///var/log/zhamen/results.jsonl`
pub struct JsonLinesSink {
  path: PathBuf,
  writer: BufWriter<File>,
}

impl FromUrlWithScheme for JsonLinesSink {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesSink {
  type Error = JsonLinesSinkError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonLinesSinkError::SchemeMismatch);
    }
    Self::open(uri.path())
  }
}

impl JsonLinesSink {
  /// 追加写入，父目录不存在时自动创建
  pub fn open(path: impl AsRef<Path>) -> Result<Self, JsonLinesSinkError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("推理结果写入: {}", path.display());

    Ok(Self {
      path,
      writer: BufWriter::new(file),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn record(outcome: &InferenceOutcome) -> Value {
    let mut record = json!({
      "frame_timestamp_ms": outcome.frame_timestamp_ms,
      "width": outcome.width,
      "height": outcome.height,
      "delivered_at": Utc::now().to_rfc3339(),
    });

    match &outcome.result {
      Ok(result) => {
        record["categories"] = result
          .iter()
          .map(|c| json!({ "label": c.label, "score": c.score }))
          .collect();
      }
      Err(failure) => {
        record["error"] = Value::String(failure.to_string());
      }
    }
    record
  }
}

impl ResultSink for JsonLinesSink {
  type Error = JsonLinesSinkError;

  fn deliver(&mut self, outcome: &InferenceOutcome) -> Result<(), Self::Error> {
    serde_json::to_writer(&mut self.writer, &Self::record(outcome))?;
    self.writer.write_all(b"\n")?;
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    self.writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::{Category, InferenceResult},
    output::InferenceFailure,
  };

  #[test]
  fn writes_one_line_per_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("results.jsonl");
    let mut sink = JsonLinesSink::open(&path).unwrap();

    sink
      .deliver(&InferenceOutcome {
        frame_timestamp_ms: 10,
        width: 4,
        height: 4,
        result: Ok(InferenceResult::ranked(vec![Category::new("cat", 0.75)], 0.0, 3)),
      })
      .unwrap();
    sink
      .deliver(&InferenceOutcome {
        frame_timestamp_ms: 20,
        width: 4,
        height: 4,
        result: Err(InferenceFailure::Panicked("boom".into())),
      })
      .unwrap();
    sink.finish().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = text
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["frame_timestamp_ms"], 10);
    assert_eq!(lines[0]["categories"][0]["label"], "cat");
    assert_eq!(lines[1]["frame_timestamp_ms"], 20);
    assert!(lines[1]["error"].as_str().unwrap().contains("boom"));
  }
}
