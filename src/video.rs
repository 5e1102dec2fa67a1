// video.rs — 通过 ffmpeg 子进程解码视频帧
//
// ffmpeg 以固定帧率和尺寸输出原始 RGBA，循环播放、无音轨。
// 读取线程按播放时钟放帧，只保留最新一帧；暂停时时钟停走，
// 读取随之停下，由管道背压让 ffmpeg 停下，恢复后从暂停处继续。

use crate::error::MediaError;
use image::RgbaImage;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "ogg"];
/// ffmpeg 输出的帧率，读取线程据此放帧
pub const VIDEO_FPS: u32 = 30;

/// 只在播放时前进的时钟
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    elapsed: Duration,
    running_since: Option<Instant>,
}

impl PlaybackClock {
    pub fn started_at(now: Instant) -> Self {
        Self { elapsed: Duration::ZERO, running_since: Some(now) }
    }

    pub fn position(&self, now: Instant) -> Duration {
        self.elapsed + self.running_since.map(|s| now.saturating_duration_since(s)).unwrap_or_default()
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += now.saturating_duration_since(since);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// 此刻应当显示的帧序号
    pub fn frame_index(&self, now: Instant) -> u64 {
        (self.position(now).as_secs_f64() * VIDEO_FPS as f64).floor() as u64
    }
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub frame_size: u32,
    pub ffmpeg_path: Option<PathBuf>,
}

/// 查找 ffmpeg：配置路径 -> assets/ffmpeg -> PATH -> 常见安装位置
pub fn find_ffmpeg(configured: Option<&Path>) -> Result<PathBuf, MediaError> {
    if let Some(p) = configured {
        if p.exists() {
            return Ok(p.to_path_buf());
        }
        log::warn!("configured ffmpeg {:?} does not exist", p);
    }

    let bundled = if cfg!(windows) {
        PathBuf::from("assets/ffmpeg/ffmpeg.exe")
    } else {
        PathBuf::from("assets/ffmpeg/ffmpeg")
    };
    if bundled.exists() {
        return Ok(bundled);
    }

    if let Ok(p) = which::which("ffmpeg") {
        return Ok(p);
    }

    let common: &[&str] = if cfg!(target_os = "macos") {
        &["/usr/local/bin/ffmpeg", "/opt/homebrew/bin/ffmpeg"]
    } else if cfg!(windows) {
        &["C:\\ffmpeg\\bin\\ffmpeg.exe", "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"]
    } else {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg"]
    };
    common
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(MediaError::FfmpegNotFound)
}

struct Shared {
    clock: Mutex<PlaybackClock>,
    stopped: AtomicBool,
    serial: AtomicU64,
    latest: Mutex<Option<Arc<RgbaImage>>>,
}

impl Shared {
    fn new(now: Instant) -> Self {
        Self {
            clock: Mutex::new(PlaybackClock::started_at(now)),
            stopped: AtomicBool::new(false),
            serial: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    fn clock(&self) -> Option<PlaybackClock> {
        self.clock.lock().ok().map(|c| *c)
    }
}

pub struct VideoStream {
    shared: Arc<Shared>,
    child: Option<Child>,
}

impl std::fmt::Debug for VideoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoStream")
            .field("paused", &self.is_paused())
            .field("serial", &self.serial())
            .finish()
    }
}

impl VideoStream {
    pub fn open(path: &Path, settings: &VideoSettings) -> Result<Self, MediaError> {
        let ffmpeg = find_ffmpeg(settings.ffmpeg_path.as_deref())?;
        let size = settings.frame_size.max(16);

        let mut child = Command::new(ffmpeg)
            .args(["-v", "error", "-stream_loop", "-1", "-i"])
            .arg(path)
            .args(["-an", "-vf"])
            .arg(format!("fps={VIDEO_FPS},scale={size}:{size}"))
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(MediaError::FfmpegSpawn)?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::FfmpegSpawn(std::io::Error::other("no stdout pipe")))?;

        let shared = Arc::new(Shared::new(Instant::now()));
        let worker = shared.clone();
        let label = path.display().to_string();

        thread::spawn(move || {
            let mut buf = vec![0u8; (size * size * 4) as usize];
            let mut index: u64 = 0;
            'frames: loop {
                if worker.stopped.load(Ordering::Relaxed) || stdout.read_exact(&mut buf).is_err() {
                    break;
                }
                // 第一帧立即放出；之后等时钟走到这一帧。暂停期间时钟不走，一直等在这里。
                while index > 0 {
                    if worker.stopped.load(Ordering::Relaxed) {
                        break 'frames;
                    }
                    let Some(clock) = worker.clock() else {
                        break 'frames;
                    };
                    if clock.frame_index(Instant::now()) >= index {
                        break;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                if let Some(frame) = RgbaImage::from_raw(size, size, buf.clone()) {
                    if let Ok(mut slot) = worker.latest.lock() {
                        *slot = Some(Arc::new(frame));
                    }
                    worker.serial.fetch_add(1, Ordering::Release);
                }
                index += 1;
            }
            log::debug!("video reader for {label} finished");
        });

        log::info!("video stream started: {:?}", path);
        Ok(Self { shared, child: Some(child) })
    }

    /// 有至少一帧可用即视为可播放
    pub fn is_ready(&self) -> bool {
        self.serial() > 0
    }

    /// 每解出一帧加一，用来判断是否需要重新上传
    pub fn serial(&self) -> u64 {
        self.shared.serial.load(Ordering::Acquire)
    }

    pub fn latest_frame(&self) -> Option<Arc<RgbaImage>> {
        self.shared.latest.lock().ok().and_then(|s| s.clone())
    }

    pub fn set_paused(&self, paused: bool) {
        self.set_paused_at(paused, Instant::now());
    }

    pub fn set_paused_at(&self, paused: bool, now: Instant) {
        if let Ok(mut clock) = self.shared.clock.lock() {
            if paused {
                clock.pause(now);
            } else {
                clock.resume(now);
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.clock().is_some_and(|c| !c.is_running())
    }

    /// 播放时钟此刻对应的帧序号
    #[cfg(test)]
    pub fn frame_index_at(&self, now: Instant) -> u64 {
        self.shared.clock().map(|c| c.frame_index(now)).unwrap_or(0)
    }

    /// 不启动进程的流，直接推入帧
    #[cfg(test)]
    pub fn detached() -> Self {
        Self::detached_at(Instant::now())
    }

    #[cfg(test)]
    pub fn detached_at(start: Instant) -> Self {
        Self { shared: Arc::new(Shared::new(start)), child: None }
    }

    #[cfg(test)]
    pub fn push_frame(&self, frame: RgbaImage) {
        if let Ok(mut slot) = self.shared.latest.lock() {
            *slot = Some(Arc::new(frame));
        }
        self.shared.serial.fetch_add(1, Ordering::Release);
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Relaxed);
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
        .unwrap_or(false)
}
