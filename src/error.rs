// error.rs — 错误类型（媒体解码 / 配置加载）

use std::path::PathBuf;
use thiserror::Error;

/// 媒体加载失败。调用方只记录日志，对应的面保持占位色。
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("ffmpeg binary not found (install it or place it in assets/ffmpeg/)")]
    FfmpegNotFound,
    #[error("failed to spawn ffmpeg: {0}")]
    FfmpegSpawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
