// media.rs — 素材登记与后台解码
//
// 图片在后台线程解码，结果通过 channel 回到事件循环线程。
// 每个请求带 (media, generation) 令牌，由 AppState 判断结果是否仍然适用。

use crate::error::MediaError;
use crate::scene::{MediaId, MediaKind, MediaRef};
use crate::video::{is_video_path, VideoSettings, VideoStream};

use image::io::Reader as ImageReader;
use image::RgbaImage;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeToken {
    pub media: MediaId,
    pub generation: u64,
}

#[derive(Debug)]
pub struct Decoded {
    pub token: DecodeToken,
    pub result: Result<RgbaImage, MediaError>,
}

#[derive(Debug)]
pub enum MediaState {
    Pending,
    Image(Arc<RgbaImage>),
    Video(VideoStream),
    Failed,
}

#[derive(Debug)]
pub struct MediaEntry {
    pub path: PathBuf,
    pub state: MediaState,
}

pub struct MediaStore {
    entries: HashMap<MediaId, MediaEntry>,
    next_id: u64,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
    video: VideoSettings,
    videos_paused: bool,
}

pub fn kind_of(path: &Path) -> MediaKind {
    if is_video_path(path) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

pub fn decode_image(path: &Path) -> Result<RgbaImage, MediaError> {
    let file = File::open(path).map_err(|source| MediaError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)
        .and_then(|mut r| {
            r.no_limits();
            r.decode()
        })
        .map_err(|source| MediaError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(decoded.to_rgba8())
}

impl MediaStore {
    pub fn new(video: VideoSettings) -> Self {
        let (tx, rx) = channel();
        Self {
            entries: HashMap::new(),
            next_id: 1,
            tx,
            rx,
            video,
            videos_paused: false,
        }
    }

    fn allocate(&mut self) -> MediaId {
        let id = MediaId(self.next_id);
        self.next_id += 1;
        id
    }

    /// 登记一个文件并开始加载。图片异步解码；视频立即启动解码进程，
    /// 失败时条目标记为 Failed，对应面显示占位色。
    pub fn load(&mut self, path: PathBuf, generation: u64) -> MediaRef {
        let id = self.allocate();
        let kind = kind_of(&path);

        let state = match kind {
            MediaKind::Image => {
                let token = DecodeToken { media: id, generation };
                let tx = self.tx.clone();
                let p = path.clone();
                thread::spawn(move || {
                    log::info!("decoding {:?} in background", p);
                    let result = decode_image(&p);
                    if tx.send(Decoded { token, result }).is_err() {
                        log::debug!("decode result for {:?} dropped, store is gone", p);
                    }
                });
                MediaState::Pending
            }
            MediaKind::Video => match VideoStream::open(&path, &self.video) {
                Ok(stream) => {
                    stream.set_paused(self.videos_paused);
                    MediaState::Video(stream)
                }
                Err(e) => {
                    log::warn!("{e}");
                    MediaState::Failed
                }
            },
        };

        self.entries.insert(id, MediaEntry { path, state });
        MediaRef { id, kind }
    }

    /// 直接登记已解码的图片
    #[cfg(test)]
    pub fn insert_image(&mut self, path: impl Into<PathBuf>, image: RgbaImage) -> MediaRef {
        let id = self.allocate();
        self.entries.insert(
            id,
            MediaEntry {
                path: path.into(),
                state: MediaState::Image(Arc::new(image)),
            },
        );
        MediaRef { id, kind: MediaKind::Image }
    }

    #[cfg(test)]
    pub fn insert_pending(&mut self, path: impl Into<PathBuf>) -> MediaRef {
        let id = self.allocate();
        self.entries.insert(
            id,
            MediaEntry {
                path: path.into(),
                state: MediaState::Pending,
            },
        );
        MediaRef { id, kind: MediaKind::Image }
    }

    #[cfg(test)]
    pub fn insert_video(&mut self, path: impl Into<PathBuf>, stream: VideoStream) -> MediaRef {
        let id = self.allocate();
        stream.set_paused(self.videos_paused);
        self.entries.insert(
            id,
            MediaEntry {
                path: path.into(),
                state: MediaState::Video(stream),
            },
        );
        MediaRef { id, kind: MediaKind::Video }
    }

    #[cfg(test)]
    pub fn sender(&self) -> Sender<Decoded> {
        self.tx.clone()
    }

    /// 释放素材；视频进程随 VideoStream 一起被回收
    pub fn release(&mut self, id: MediaId) {
        if let Some(entry) = self.entries.remove(&id) {
            log::debug!("released {:?} ({:?})", id, entry.path);
        }
    }

    pub fn contains(&self, id: MediaId) -> bool {
        self.entries.contains_key(&id)
    }

    /// 取出所有已完成的解码结果
    pub fn drain_decoded(&self) -> Vec<Decoded> {
        self.rx.try_iter().collect()
    }

    /// 保存解码结果。素材已被释放时返回 false（结果作废）。
    pub fn store_decoded(&mut self, id: MediaId, result: Result<RgbaImage, MediaError>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.state = match result {
            Ok(img) => {
                log::info!("decoded {:?}: {}x{}", entry.path, img.width(), img.height());
                MediaState::Image(Arc::new(img))
            }
            Err(e) => {
                log::warn!("{e}");
                MediaState::Failed
            }
        };
        true
    }

    pub fn image(&self, id: MediaId) -> Option<Arc<RgbaImage>> {
        match self.entries.get(&id).map(|e| &e.state) {
            Some(MediaState::Image(img)) => Some(img.clone()),
            _ => None,
        }
    }

    pub fn video(&self, id: MediaId) -> Option<&VideoStream> {
        match self.entries.get(&id).map(|e| &e.state) {
            Some(MediaState::Video(v)) => Some(v),
            _ => None,
        }
    }

    /// 图片已解码，或视频已有首帧
    pub fn is_ready(&self, id: MediaId) -> bool {
        match self.entries.get(&id).map(|e| &e.state) {
            Some(MediaState::Image(_)) => true,
            Some(MediaState::Video(v)) => v.is_ready(),
            _ => false,
        }
    }

    pub fn videos_paused(&self) -> bool {
        self.videos_paused
    }

    /// 统一暂停 / 恢复所有视频
    pub fn set_videos_paused(&mut self, paused: bool) {
        self.videos_paused = paused;
        for v in self.videos() {
            v.set_paused(paused);
        }
    }

    pub fn videos(&self) -> impl Iterator<Item = &VideoStream> {
        self.entries.values().filter_map(|e| match &e.state {
            MediaState::Video(v) => Some(v),
            _ => None,
        })
    }
}
