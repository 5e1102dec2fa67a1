// config.rs — 启动配置
//
// 加载顺序：内置默认值 -> JSON 配置文件 -> 语言参数
// - 配置文件：--config <path> 或环境变量 PHOTOCUBE_CONFIG
// - 语言：--lang <code> 或环境变量 PHOTOCUBE_LANG

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub lang: String,
    pub radius: f32,
    /// 外部视角时相机沿 +Z 轴到原点的距离
    pub outside_distance: f32,
    pub base_fov: f32,
    /// 外部视角下每帧自动旋转的弧度
    pub auto_rotate_speed: f32,
    /// 拖拽：每像素对应的偏航弧度
    pub drag_sensitivity: f32,
    /// 滚轮：每格对应的视场角（度）
    pub wheel_sensitivity: f32,
    pub placeholder_color: [u8; 3],
    /// 左右两面强制显示占位色
    pub lock_side_faces: bool,
    pub video_frame_size: u32,
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            radius: 1000.0,
            outside_distance: 1800.0,
            base_fov: 55.0,
            auto_rotate_speed: 0.002,
            drag_sensitivity: 0.005,
            wheel_sensitivity: 2.5,
            placeholder_color: [136, 136, 136],
            lock_side_faces: false,
            video_frame_size: 1024,
            ffmpeg_path: None,
        }
    }
}

impl ViewerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// 根据命令行与环境变量得到最终配置。配置文件出错时保留默认值。
    pub fn resolve(args: &[String]) -> Self {
        let config_path = arg_value(args, "--config").map(PathBuf::from).or_else(|| {
            std::env::var("PHOTOCUBE_CONFIG")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        });

        let mut config = match config_path {
            Some(path) => match Self::from_file(&path) {
                Ok(c) => {
                    log::info!("loaded config from {:?}", path);
                    c
                }
                Err(e) => {
                    log::warn!("{e}; using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(lang) = arg_value(args, "--lang") {
            config.lang = lang;
        } else if let Ok(v) = std::env::var("PHOTOCUBE_LANG") {
            if !v.trim().is_empty() {
                config.lang = v;
            }
        }

        config
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == flag {
            return it.next().cloned();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults_for_missing_keys() {
        let c = ViewerConfig::from_json(r#"{ "radius": 750.0, "lock_side_faces": true }"#).unwrap();
        assert_eq!(c.radius, 750.0);
        assert!(c.lock_side_faces);
        assert_eq!(c.outside_distance, 1800.0);
        assert_eq!(c.lang, "en");
    }

    #[test]
    fn lang_flag_overrides_default() {
        let args: Vec<String> = ["photocube", "--lang", "es"].iter().map(|s| s.to_string()).collect();
        let c = ViewerConfig::resolve(&args);
        assert_eq!(c.lang, "es");
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let args: Vec<String> = ["photocube", "--config", "/nonexistent/photocube.json"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let c = ViewerConfig::resolve(&args);
        assert_eq!(c.radius, ViewerConfig::default().radius);
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(ViewerConfig::from_json("{ radius: }").is_err());
    }
}
