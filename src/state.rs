// state.rs — 视图 / 几何控制器
//
// 场景、视角、旋转、素材等全部状态集中在 AppState，所有修改都通过方法进行。
// 任何影响几何或材质的修改都会触发一次完整重建（generation + 1）。

use crate::builder::{self, BuildRequest, MeshBuild, ShapeKind, ShapeParams};
use crate::camera::{CameraRig, ViewMode};
use crate::config::ViewerConfig;
use crate::input::{self, Action, KEY_ROTATE_STEP, MAX_PITCH};
use crate::media::MediaStore;
use crate::scene::{FaceKey, MediaKind, MediaRef, SceneList, TextPosition};
use crate::video::VideoSettings;

use glam::{Mat4, Vec3};
use std::path::PathBuf;

pub const INSIDE_MIN_FOV: f32 = 60.0;
pub const INSIDE_MAX_FOV: f32 = 130.0;
/// 内部视角的视场角与半径成正比：半径 1000 对应 90°
const INSIDE_FOV_PER_UNIT: f32 = 0.09;
/// 外部相机到原点的距离至少是形状最远点的这么多倍
const OUTSIDE_CLEARANCE: f32 = 1.5;
const FAR_MARGIN: f32 = 1.1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationState {
    pub yaw: f32,
    pub pitch: f32,
}

impl RotationState {
    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_x(self.pitch) * Mat4::from_rotation_y(self.yaw)
    }
}

pub fn inside_fov(radius: f32) -> f32 {
    (radius * INSIDE_FOV_PER_UNIT).clamp(INSIDE_MIN_FOV, INSIDE_MAX_FOV)
}

/// 事件循环之外的副作用，交给宿主处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    OpenMediaDialog,
    ToggleFullscreen,
}

pub struct AppState {
    pub config: ViewerConfig,
    pub shape: ShapeKind,
    pub params: ShapeParams,
    pub mode: ViewMode,
    pub rotation: RotationState,
    pub camera: CameraRig,
    pub scenes: SceneList,
    pub media: MediaStore,
    pub panel_visible: bool,
    panoramas: Vec<MediaRef>,
    panorama_index: usize,
    generation: u64,
    build: MeshBuild,
    needs_rebuild: bool,
}

impl AppState {
    pub fn new(config: ViewerConfig) -> Self {
        let media = MediaStore::new(VideoSettings {
            frame_size: config.video_frame_size,
            ffmpeg_path: config.ffmpeg_path.clone(),
        });
        let params = ShapeParams::with_radius(config.radius);
        let scenes = SceneList::new();
        let camera = CameraRig::new(Vec3::new(0.0, 0.0, config.outside_distance), config.base_fov);

        let build = builder::build(
            &BuildRequest {
                generation: 0,
                shape: ShapeKind::Sphere,
                params,
                mode: ViewMode::Outside,
                scene: scenes.current(),
                panorama: None,
                lock_side_faces: config.lock_side_faces,
            },
            &media,
        );

        let mut state = Self {
            config,
            shape: ShapeKind::Sphere,
            params,
            mode: ViewMode::Outside,
            rotation: RotationState::default(),
            camera,
            scenes,
            media,
            panel_visible: true,
            panoramas: Vec::new(),
            panorama_index: 0,
            generation: 0,
            build,
            needs_rebuild: false,
        };
        state.fit_camera_to_shape();
        state
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_build(&self) -> &MeshBuild {
        &self.build
    }

    /// 销毁旧网格与材质并重新生成
    pub fn rebuild(&mut self) {
        self.generation += 1;
        self.needs_rebuild = false;
        let req = BuildRequest {
            generation: self.generation,
            shape: self.shape,
            params: self.params,
            mode: self.mode,
            scene: self.scenes.current(),
            panorama: self.current_panorama(),
            lock_side_faces: self.config.lock_side_faces,
        };
        self.build = builder::build(&req, &self.media);
    }

    /// 原点到形状最远顶点的距离
    pub fn shape_extent(&self) -> f32 {
        match self.shape {
            ShapeKind::Sphere => self.params.radius,
            ShapeKind::Cube => {
                let [w, h, d] = self.params.box_size();
                Vec3::new(w, h, d).length() * 0.5
            }
        }
    }

    /// 外部视角的相机位置，始终在形状之外
    pub fn outside_anchor(&self) -> Vec3 {
        let distance = self.config.outside_distance.max(self.shape_extent() * OUTSIDE_CLEARANCE);
        Vec3::new(0.0, 0.0, distance)
    }

    /// 形状尺寸变化后重新摆放外部相机并放大远裁剪面
    fn fit_camera_to_shape(&mut self) {
        let anchor = self.outside_anchor();
        self.camera.far = (anchor.z + self.shape_extent()) * FAR_MARGIN;
        if self.mode != ViewMode::Outside {
            return;
        }
        if self.camera.is_transitioning() {
            self.camera.retarget(anchor);
        } else {
            self.camera.position = anchor;
        }
    }

    // ---- 视角 ----

    /// 请求切换到指定视角；已处于该视角时不做任何事
    pub fn request_mode(&mut self, target: ViewMode) -> bool {
        if self.mode == target {
            return false;
        }
        // 视角标志立即翻转，只有相机位置是渐变的
        self.mode = target;
        let anchor = match target {
            ViewMode::Inside => Vec3::ZERO,
            ViewMode::Outside => self.outside_anchor(),
        };
        self.camera.start_transition(anchor);
        self.camera.fov = match target {
            ViewMode::Inside => inside_fov(self.params.radius),
            ViewMode::Outside => self.config.base_fov,
        };
        log::info!("view mode -> {:?}", target);
        self.rebuild();
        true
    }

    pub fn toggle_mode(&mut self) {
        self.request_mode(self.mode.toggled());
    }

    // ---- 形状 ----

    pub fn set_shape(&mut self, shape: ShapeKind) {
        if self.shape != shape {
            self.shape = shape;
            self.fit_camera_to_shape();
            self.rebuild();
        }
    }

    pub fn toggle_shape(&mut self) {
        self.set_shape(self.shape.toggled());
    }

    pub fn set_params(&mut self, params: ShapeParams) {
        let params = params.clamped();
        if params == self.params {
            return;
        }
        self.params = params;
        self.fit_camera_to_shape();
        if self.mode == ViewMode::Inside {
            self.camera.fov = inside_fov(params.radius);
        }
        self.rebuild();
    }

    // ---- 旋转 / 缩放 ----

    pub fn drag(&mut self, dx: f32) {
        self.rotation.yaw += dx * self.config.drag_sensitivity;
    }

    pub fn zoom(&mut self, lines: f32) {
        self.camera.fov = input::zoomed_fov(self.camera.fov, lines, self.config.wheel_sensitivity);
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.camera.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        self.camera.view_proj()
    }

    // ---- 场景 ----

    pub fn add_scene(&mut self) {
        self.scenes.add();
        self.rebuild();
    }

    pub fn delete_scene(&mut self) -> bool {
        let Some(removed) = self.scenes.delete_current() else {
            return false;
        };
        for m in removed.media() {
            self.release_if_unused(m);
        }
        self.rebuild();
        true
    }

    pub fn select_scene(&mut self, index: usize) -> bool {
        if index == self.scenes.current_index() {
            return index < self.scenes.len();
        }
        let ok = self.scenes.select(index);
        if ok {
            self.rebuild();
        }
        ok
    }

    pub fn next_scene(&mut self) {
        if self.scenes.len() > 1 {
            self.scenes.select_next();
            self.rebuild();
        }
    }

    pub fn prev_scene(&mut self) {
        if self.scenes.len() > 1 {
            self.scenes.select_prev();
            self.rebuild();
        }
    }

    // ---- 各面素材 ----

    /// 当前场景某一面换上新文件；旧素材不再被引用时释放
    pub fn assign_face_media(&mut self, face: FaceKey, path: PathBuf) {
        let m = self.media.load(path, self.generation + 1);
        let old = self.scenes.current_mut().face_mut(face).media.replace(m);
        if let Some(old) = old {
            self.release_if_unused(old);
        }
        self.rebuild();
    }

    pub fn clear_face_media(&mut self, face: FaceKey) {
        if let Some(old) = self.scenes.current_mut().face_mut(face).media.take() {
            self.release_if_unused(old);
            self.rebuild();
        }
    }

    pub fn set_face_text(&mut self, face: FaceKey, text: String) {
        let a = self.scenes.current_mut().face_mut(face);
        if a.overlay_text != text {
            a.overlay_text = text;
            self.refresh_caption(face);
        }
    }

    pub fn set_text_position(&mut self, face: FaceKey, position: TextPosition) {
        let a = self.scenes.current_mut().face_mut(face);
        if a.text_position != position {
            a.text_position = position;
            self.refresh_caption(face);
        }
    }

    /// 文字只影响一个槽位：就地修补，不重建网格
    fn refresh_caption(&mut self, face: FaceKey) {
        let locked = self.config.lock_side_faces && matches!(face, FaceKey::Left | FaceKey::Right);
        if self.shape != ShapeKind::Cube || locked {
            return;
        }
        let caption = builder::caption_for(self.scenes.current().face(face));
        self.build.set_caption(face.box_index(), caption);
    }

    fn release_if_unused(&mut self, m: MediaRef) {
        let in_gallery = self.panoramas.iter().any(|p| p.id == m.id);
        if !in_gallery && !self.scenes.references(m.id) {
            self.media.release(m.id);
        }
    }

    // ---- 全景图库（球体） ----

    /// 用新选择的一组文件替换图库
    pub fn load_panoramas(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.panoramas);
        let generation = self.generation + 1;
        self.panoramas = paths.into_iter().map(|p| self.media.load(p, generation)).collect();
        self.panorama_index = 0;
        for m in old {
            self.release_if_unused(m);
        }
        self.rebuild();
    }

    /// 追加一张全景图并切换过去（拖放文件）
    pub fn add_panorama(&mut self, path: PathBuf) {
        let m = self.media.load(path, self.generation + 1);
        self.panoramas.push(m);
        self.panorama_index = self.panoramas.len() - 1;
        self.rebuild();
    }

    pub fn current_panorama(&self) -> Option<MediaRef> {
        self.panoramas.get(self.panorama_index).copied()
    }

    pub fn panorama_index(&self) -> usize {
        self.panorama_index
    }

    pub fn panorama_count(&self) -> usize {
        self.panoramas.len()
    }

    pub fn cycle_panorama(&mut self, step: isize) {
        let n = self.panoramas.len() as isize;
        if n == 0 {
            return;
        }
        self.panorama_index = (self.panorama_index as isize + step).rem_euclid(n) as usize;
        if self.shape == ShapeKind::Sphere {
            self.rebuild();
        }
    }

    // ---- 视频 ----

    pub fn toggle_video_pause(&mut self) {
        let paused = !self.media.videos_paused();
        self.media.set_videos_paused(paused);
        log::info!("videos {}", if paused { "paused" } else { "playing" });
    }

    // ---- 输入 ----

    /// 执行一个离散动作；需要宿主配合的动作原样返回
    pub fn apply(&mut self, action: Action) -> Option<HostRequest> {
        match action {
            Action::YawLeft => self.rotation.yaw += KEY_ROTATE_STEP,
            Action::YawRight => self.rotation.yaw -= KEY_ROTATE_STEP,
            Action::PitchUp => self.rotation.pitch = (self.rotation.pitch - KEY_ROTATE_STEP).max(-MAX_PITCH),
            Action::PitchDown => self.rotation.pitch = (self.rotation.pitch + KEY_ROTATE_STEP).min(MAX_PITCH),
            Action::ToggleMode => self.toggle_mode(),
            Action::EnterInside => {
                self.request_mode(ViewMode::Inside);
            }
            Action::ExitOutside => {
                self.request_mode(ViewMode::Outside);
            }
            Action::NextPanorama => self.cycle_panorama(1),
            Action::ToggleShape => self.toggle_shape(),
            Action::NextScene => self.next_scene(),
            Action::PrevScene => self.prev_scene(),
            Action::ToggleVideoPause => self.toggle_video_pause(),
            Action::TogglePanel => self.panel_visible = !self.panel_visible,
            Action::OpenMedia => return Some(HostRequest::OpenMediaDialog),
            Action::ToggleFullscreen => return Some(HostRequest::ToggleFullscreen),
        }
        None
    }

    // ---- 每帧 ----

    /// 每帧调用一次：相机过渡、自动旋转、收取解码结果
    pub fn frame_tick(&mut self) {
        self.camera.tick();
        if self.mode == ViewMode::Outside {
            self.rotation.yaw += self.config.auto_rotate_speed;
        }

        for decoded in self.media.drain_decoded() {
            let id = decoded.token.media;
            if !self.media.store_decoded(id, decoded.result) {
                log::debug!("discarding result for released {:?}", id);
                continue;
            }
            if decoded.token.generation == self.generation {
                self.build.promote_ready(&self.media);
            } else {
                // 令牌过期：不改动当前材质，让下一次重建从缓存取图
                self.needs_rebuild = true;
            }
        }

        if self.needs_rebuild {
            self.rebuild();
            return;
        }

        // 视频首帧到达
        let video_ready = self
            .build
            .pending
            .iter()
            .any(|(_, m, _)| m.kind == MediaKind::Video && self.media.is_ready(m.id));
        if video_ready {
            self.build.promote_ready(&self.media);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Caption, Material, Side};
    use crate::mesh::Mesh;
    use crate::media::{DecodeToken, Decoded};
    use crate::video::VideoStream;
    use image::RgbaImage;

    fn state() -> AppState {
        AppState::new(ViewerConfig { auto_rotate_speed: 0.0, ..ViewerConfig::default() })
    }

    #[test]
    fn double_toggle_restores_anchor_and_side() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let side = s.current_build().side;
        let anchor = s.camera.position;

        s.toggle_mode();
        assert_eq!(s.mode, ViewMode::Inside);
        assert_ne!(s.current_build().side, side);
        for _ in 0..60 {
            s.frame_tick();
        }
        assert_eq!(s.camera.position, Vec3::ZERO);

        s.toggle_mode();
        for _ in 0..60 {
            s.frame_tick();
        }
        assert_eq!(s.camera.position, anchor);
        assert_eq!(s.current_build().side, side);
        assert_eq!(s.current_build().side, Side::Front);
    }

    #[test]
    fn requesting_current_mode_is_noop() {
        let mut s = state();
        let g = s.generation();
        assert!(!s.request_mode(ViewMode::Outside));
        assert_eq!(s.generation(), g);
        assert!(!s.camera.is_transitioning());
        assert!(s.request_mode(ViewMode::Inside));
        assert!(!s.request_mode(ViewMode::Inside));
    }

    #[test]
    fn mode_flag_flips_before_camera_arrives() {
        let mut s = state();
        s.apply(Action::EnterInside);
        assert_eq!(s.mode, ViewMode::Inside);
        assert!(s.camera.is_transitioning());
        assert_eq!(s.current_build().side, Side::Front);
    }

    #[test]
    fn inside_fov_tracks_radius() {
        let mut s = state();
        s.request_mode(ViewMode::Inside);
        assert_eq!(s.camera.fov, 90.0);
        s.set_params(ShapeParams { radius: 2000.0, ..s.params });
        assert_eq!(s.camera.fov, INSIDE_MAX_FOV);
        s.set_params(ShapeParams { radius: 100.0, ..s.params });
        assert_eq!(s.camera.fov, INSIDE_MIN_FOV);
        s.request_mode(ViewMode::Outside);
        assert_eq!(s.camera.fov, s.config.base_fov);
    }

    #[test]
    fn params_change_rebuilds_geometry() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let g = s.generation();
        s.set_params(ShapeParams { radius: 500.0, width_scale: 2.0, ..s.params });
        assert_eq!(s.generation(), g + 1);
        let size = s.current_build().mesh.size();
        assert!((size.x - 1000.0).abs() < 1e-3);
        assert!((size.y - 500.0).abs() < 1e-3);
    }

    fn visible_triangles(mesh: &Mesh, eye: Vec3, side: Side) -> usize {
        (0..mesh.indices.len() / 3)
            .filter(|t| {
                let p = |k: usize| Vec3::from_array(mesh.positions[mesh.indices[t * 3 + k] as usize]);
                let n = (p(1) - p(0)).cross(p(2) - p(0));
                if n.length_squared() < 1e-9 {
                    return false;
                }
                // 逆时针为正面；Front 剔除背面，Back 剔除正面
                let facing = n.dot(eye - p(0));
                match side {
                    Side::Front => facing > 0.0,
                    Side::Back => facing < 0.0,
                }
            })
            .count()
    }

    #[test]
    fn largest_shapes_stay_in_front_of_outside_camera() {
        let mut s = state();
        let max = ShapeParams {
            radius: *ShapeParams::RADIUS_RANGE.end(),
            width_scale: *ShapeParams::SCALE_RANGE.end(),
            height_scale: *ShapeParams::SCALE_RANGE.end(),
            depth_scale: *ShapeParams::SCALE_RANGE.end(),
        };
        for shape in [ShapeKind::Sphere, ShapeKind::Cube] {
            s.set_shape(shape);
            s.set_params(max);
            assert_eq!(s.mode, ViewMode::Outside);

            let eye = s.camera.position;
            let build = s.current_build();
            let (lo, hi) = build.mesh.bounding_box();
            assert!(
                !(eye.cmpge(lo).all() && eye.cmple(hi).all()),
                "{shape:?}: camera {eye} inside the mesh"
            );
            let farthest = build
                .mesh
                .positions
                .iter()
                .map(|p| eye.distance(Vec3::from_array(*p)))
                .fold(0.0, f32::max);
            assert!(farthest < s.camera.far, "{shape:?}: {farthest} beyond far plane {}", s.camera.far);
            assert!(visible_triangles(&build.mesh, eye, build.side) > 0, "{shape:?}: everything culled");
        }
    }

    #[test]
    fn default_shape_keeps_configured_anchor() {
        let s = state();
        assert_eq!(s.camera.position, Vec3::new(0.0, 0.0, 1800.0));
        let build = s.current_build();
        assert!(visible_triangles(&build.mesh, s.camera.position, build.side) > 0);
    }

    #[test]
    fn shrinking_while_exiting_retargets_camera() {
        let mut s = state();
        s.set_params(ShapeParams { radius: 2000.0, ..s.params });
        s.request_mode(ViewMode::Inside);
        for _ in 0..60 {
            s.frame_tick();
        }
        s.request_mode(ViewMode::Outside);
        for _ in 0..10 {
            s.frame_tick();
        }
        s.set_params(ShapeParams { radius: 500.0, ..s.params });
        for _ in 0..50 {
            s.frame_tick();
        }
        assert_eq!(s.camera.position, Vec3::new(0.0, 0.0, 1800.0));
    }

    #[test]
    fn editing_caption_patches_without_rebuild() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let m = s.media.insert_pending("front.png");
        s.scenes.current_mut().face_mut(FaceKey::Front).media = Some(m);
        s.rebuild();
        let g = s.generation();

        for text in ["h", "he", "hey"] {
            s.set_face_text(FaceKey::Front, text.into());
        }
        s.set_text_position(FaceKey::Front, TextPosition::Top);
        assert_eq!(s.generation(), g);
        let caption = Caption { text: "hey".into(), position: TextPosition::Top };
        assert_eq!(s.current_build().materials[4], Material::Caption(caption.clone()));

        // 编辑期间发出的解码结果仍然是当前的
        s.media
            .sender()
            .send(Decoded {
                token: DecodeToken { media: m.id, generation: g },
                result: Ok(RgbaImage::new(2, 2)),
            })
            .unwrap();
        s.frame_tick();
        assert_eq!(s.generation(), g);
        assert_eq!(s.current_build().materials[4], Material::Image { media: m.id, caption: Some(caption) });
    }

    #[test]
    fn locked_face_text_is_ignored_on_screen() {
        let mut s = AppState::new(ViewerConfig {
            auto_rotate_speed: 0.0,
            lock_side_faces: true,
            ..ViewerConfig::default()
        });
        s.set_shape(ShapeKind::Cube);
        s.set_face_text(FaceKey::Left, "nope".into());
        assert_eq!(s.current_build().materials[0], Material::Placeholder);
        assert_eq!(s.scenes.current().face(FaceKey::Left).overlay_text, "nope");
    }

    #[test]
    fn last_scene_cannot_be_deleted() {
        let mut s = state();
        assert!(!s.delete_scene());
        assert_eq!(s.scenes.len(), 1);
        s.add_scene();
        assert!(s.delete_scene());
        assert_eq!(s.scenes.len(), 1);
        assert!(!s.select_scene(4));
    }

    #[test]
    fn deleting_scene_releases_its_media() {
        let mut s = state();
        s.add_scene();
        let m = s.media.insert_image("x.png", RgbaImage::new(2, 2));
        s.scenes.current_mut().face_mut(FaceKey::Front).media = Some(m);
        assert!(s.delete_scene());
        assert!(!s.media.contains(m.id));
    }

    #[test]
    fn stale_decode_goes_through_rebuild() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let m = s.media.insert_pending("front.png");
        s.scenes.current_mut().face_mut(FaceKey::Front).media = Some(m);
        s.rebuild();
        let g = s.generation();
        assert_eq!(s.current_build().pending.len(), 1);

        s.media
            .sender()
            .send(Decoded {
                token: DecodeToken { media: m.id, generation: g - 1 },
                result: Ok(RgbaImage::new(2, 2)),
            })
            .unwrap();
        s.frame_tick();

        // 过期令牌：结果进缓存，材质由新一轮重建生成
        assert_eq!(s.generation(), g + 1);
        assert_eq!(s.current_build().revision, 0);
        assert_eq!(s.current_build().materials[4], Material::Image { media: m.id, caption: None });
    }

    #[test]
    fn current_decode_patches_in_place() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let m = s.media.insert_pending("back.png");
        s.scenes.current_mut().face_mut(FaceKey::Back).media = Some(m);
        s.rebuild();
        let g = s.generation();
        assert_eq!(s.current_build().materials[5], Material::Placeholder);

        s.media
            .sender()
            .send(Decoded {
                token: DecodeToken { media: m.id, generation: g },
                result: Ok(RgbaImage::new(2, 2)),
            })
            .unwrap();
        s.frame_tick();

        assert_eq!(s.generation(), g);
        assert_eq!(s.current_build().revision, 1);
        assert_eq!(s.current_build().materials[5].media(), Some(m.id));
    }

    #[test]
    fn result_for_released_media_is_dropped() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let m = s.media.insert_pending("gone.png");
        s.scenes.current_mut().face_mut(FaceKey::Top).media = Some(m);
        s.clear_face_media(FaceKey::Top);
        assert!(!s.media.contains(m.id));
        let g = s.generation();

        s.media
            .sender()
            .send(Decoded {
                token: DecodeToken { media: m.id, generation: g },
                result: Ok(RgbaImage::new(2, 2)),
            })
            .unwrap();
        s.frame_tick();
        assert_eq!(s.generation(), g);
        assert!(s.current_build().materials.iter().all(|m| *m == Material::Placeholder));
    }

    #[test]
    fn video_face_switches_on_first_frame() {
        let mut s = state();
        s.set_shape(ShapeKind::Cube);
        let v = s.media.insert_video("v.mp4", VideoStream::detached());
        s.scenes.current_mut().face_mut(FaceKey::Top).media = Some(v);
        s.rebuild();
        let g = s.generation();
        assert_eq!(s.current_build().materials[2], Material::Placeholder);

        s.media.video(v.id).unwrap().push_frame(RgbaImage::new(2, 2));
        s.frame_tick();
        assert_eq!(s.generation(), g);
        assert!(s.current_build().materials[2].is_video());
    }

    #[test]
    fn pause_toggle_is_global() {
        let mut s = state();
        s.media.insert_video("a.mp4", VideoStream::detached());
        s.media.insert_video("b.mp4", VideoStream::detached());
        s.apply(Action::ToggleVideoPause);
        assert!(s.media.videos().all(|v| v.is_paused()));
        s.apply(Action::ToggleVideoPause);
        assert!(s.media.videos().all(|v| !v.is_paused()));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut s = state();
        for _ in 0..500 {
            s.apply(Action::PitchDown);
        }
        assert!((s.rotation.pitch - MAX_PITCH).abs() < 1e-6);
    }

    #[test]
    fn auto_rotation_only_outside() {
        let mut s = AppState::new(ViewerConfig::default());
        s.frame_tick();
        assert!(s.rotation.yaw > 0.0);
        s.request_mode(ViewMode::Inside);
        let yaw = s.rotation.yaw;
        s.frame_tick();
        assert_eq!(s.rotation.yaw, yaw);
    }

    #[test]
    fn panorama_gallery_wraps() {
        let mut s = state();
        s.apply(Action::NextPanorama);
        assert!(s.current_panorama().is_none());
        s.panoramas = vec![
            s.media.insert_image("a.jpg", RgbaImage::new(2, 1)),
            s.media.insert_image("b.jpg", RgbaImage::new(2, 1)),
        ];
        s.rebuild();
        assert_eq!(s.current_build().materials[0].media(), Some(s.panoramas[0].id));
        s.apply(Action::NextPanorama);
        assert_eq!(s.current_build().materials[0].media(), Some(s.panoramas[1].id));
        s.apply(Action::NextPanorama);
        assert_eq!(s.current_panorama(), Some(s.panoramas[0]));
    }

    #[test]
    fn host_actions_are_returned() {
        let mut s = state();
        assert_eq!(s.apply(Action::OpenMedia), Some(HostRequest::OpenMediaDialog));
        assert_eq!(s.apply(Action::TogglePanel), None);
        assert!(!s.panel_visible);
    }
}
