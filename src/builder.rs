// builder.rs — 由形状参数、视角与各面素材生成网格和材质
//
// 每次重建都生成全新的网格与材质表，旧的 GPU 资源由渲染器整体替换。

use crate::camera::ViewMode;
use crate::media::MediaStore;
use crate::mesh::{build_box, build_sphere, Mesh, VerticalArc, SPHERE_HEIGHT_SEGMENTS, SPHERE_WIDTH_SEGMENTS};
use crate::overlay::{self, OverlayFont, OVERLAY_SIZE};
use crate::scene::{FaceAssignment, FaceKey, MediaId, MediaKind, MediaRef, Scene, TextPosition};

use image::RgbaImage;
use std::f32::consts::PI;
use std::sync::Arc;

/// 内部视角下球面只保留中间一圈（可调）
pub const INSIDE_SPHERE_ARC: VerticalArc = VerticalArc {
    start: PI / 4.0,
    length: PI / 2.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Sphere,
    Cube,
}

impl ShapeKind {
    pub fn toggled(self) -> Self {
        match self {
            ShapeKind::Sphere => ShapeKind::Cube,
            ShapeKind::Cube => ShapeKind::Sphere,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeParams {
    pub radius: f32,
    pub width_scale: f32,
    pub height_scale: f32,
    pub depth_scale: f32,
}

impl ShapeParams {
    pub const RADIUS_RANGE: std::ops::RangeInclusive<f32> = 100.0..=2000.0;
    pub const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.1..=3.0;

    pub fn with_radius(radius: f32) -> Self {
        Self {
            radius,
            width_scale: 1.0,
            height_scale: 1.0,
            depth_scale: 1.0,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        let r = &Self::RADIUS_RANGE;
        let s = &Self::SCALE_RANGE;
        Self {
            radius: self.radius.clamp(*r.start(), *r.end()),
            width_scale: self.width_scale.clamp(*s.start(), *s.end()),
            height_scale: self.height_scale.clamp(*s.start(), *s.end()),
            depth_scale: self.depth_scale.clamp(*s.start(), *s.end()),
        }
    }

    pub fn box_size(&self) -> [f32; 3] {
        [
            self.radius * self.width_scale,
            self.radius * self.height_scale,
            self.radius * self.depth_scale,
        ]
    }
}

/// 哪一面可见：Front 剔除背面，Back 剔除正面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

pub fn side_for(shape: ShapeKind, mode: ViewMode) -> Side {
    match (shape, mode) {
        // 球的三角形朝内
        (ShapeKind::Sphere, ViewMode::Inside) => Side::Front,
        (ShapeKind::Sphere, ViewMode::Outside) => Side::Back,
        // 盒子的三角形朝外
        (ShapeKind::Cube, ViewMode::Outside) => Side::Front,
        (ShapeKind::Cube, ViewMode::Inside) => Side::Back,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub position: TextPosition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Placeholder,
    /// 无素材但有文字：占位色底 + 文字
    Caption(Caption),
    Image { media: MediaId, caption: Option<Caption> },
    Video { media: MediaId, caption: Option<Caption> },
}

impl Material {
    pub fn media(&self) -> Option<MediaId> {
        match self {
            Material::Image { media, .. } | Material::Video { media, .. } => Some(*media),
            _ => None,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Material::Video { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MeshBuild {
    pub generation: u64,
    /// 材质被就地修补时递增
    pub revision: u64,
    pub mesh: Mesh,
    pub materials: Vec<Material>,
    pub side: Side,
    /// 尚未就绪的素材所在槽位；就绪后修补为纹理材质
    pub pending: Vec<(usize, MediaRef, Option<Caption>)>,
}

impl MeshBuild {
    /// 把已就绪的素材填入对应槽位，返回是否有改动
    pub fn promote_ready(&mut self, media: &MediaStore) -> bool {
        let before = self.pending.len();
        let mut still = Vec::with_capacity(before);
        for (slot, m, caption) in self.pending.drain(..) {
            if media.is_ready(m.id) {
                self.materials[slot] = textured(m, caption);
            } else {
                still.push((slot, m, caption));
            }
        }
        self.pending = still;
        let changed = self.pending.len() != before;
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// 只换某一槽位的文字，网格与其余槽位不动
    pub fn set_caption(&mut self, slot: usize, caption: Option<Caption>) -> bool {
        let Some(current) = self.materials.get(slot) else {
            return false;
        };
        let next = with_caption(current, caption.clone());
        for entry in self.pending.iter_mut().filter(|(s, _, _)| *s == slot) {
            entry.2 = caption.clone();
        }
        if next == *current {
            return false;
        }
        self.materials[slot] = next;
        self.revision += 1;
        true
    }
}

fn with_caption(material: &Material, caption: Option<Caption>) -> Material {
    match material {
        Material::Image { media, .. } => Material::Image { media: *media, caption },
        Material::Video { media, .. } => Material::Video { media: *media, caption },
        Material::Placeholder | Material::Caption(_) => caption.map(Material::Caption).unwrap_or(Material::Placeholder),
    }
}

/// 面上有文字时对应的标题
pub fn caption_for(a: &FaceAssignment) -> Option<Caption> {
    a.has_overlay().then(|| Caption {
        text: a.overlay_text.clone(),
        position: a.text_position,
    })
}

pub struct BuildRequest<'a> {
    pub generation: u64,
    pub shape: ShapeKind,
    pub params: ShapeParams,
    pub mode: ViewMode,
    pub scene: &'a Scene,
    pub panorama: Option<MediaRef>,
    pub lock_side_faces: bool,
}

fn textured(m: MediaRef, caption: Option<Caption>) -> Material {
    match m.kind {
        MediaKind::Image => Material::Image { media: m.id, caption },
        MediaKind::Video => Material::Video { media: m.id, caption },
    }
}

pub fn build(req: &BuildRequest<'_>, media: &MediaStore) -> MeshBuild {
    let side = side_for(req.shape, req.mode);
    let mut materials = Vec::new();
    let mut pending = Vec::new();

    let mut resolve = |slot: usize, m: Option<MediaRef>, caption: Option<Caption>| -> Material {
        match m.filter(|m| media.contains(m.id)) {
            Some(m) if media.is_ready(m.id) => textured(m, caption),
            Some(m) => {
                pending.push((slot, m, caption.clone()));
                caption.map(Material::Caption).unwrap_or(Material::Placeholder)
            }
            None => caption.map(Material::Caption).unwrap_or(Material::Placeholder),
        }
    };

    let mesh = match req.shape {
        ShapeKind::Sphere => {
            let arc = match req.mode {
                ViewMode::Outside => VerticalArc::FULL,
                ViewMode::Inside => INSIDE_SPHERE_ARC,
            };
            materials.push(resolve(0, req.panorama, None));
            build_sphere(req.params.radius, SPHERE_WIDTH_SEGMENTS, SPHERE_HEIGHT_SEGMENTS, arc)
        }
        ShapeKind::Cube => {
            for face in FaceKey::ALL {
                let slot = face.box_index();
                let locked = req.lock_side_faces && matches!(face, FaceKey::Left | FaceKey::Right);
                let a = req.scene.face(face);
                let material = if locked {
                    Material::Placeholder
                } else {
                    resolve(slot, a.media, caption_for(a))
                };
                materials.push(material);
            }
            let [w, h, d] = req.params.box_size();
            build_box(w, h, d, req.mode == ViewMode::Inside)
        }
    };

    log::debug!(
        "rebuild #{}: {:?} {:?}, {} vertices, {} pending",
        req.generation,
        req.shape,
        req.mode,
        mesh.positions.len(),
        pending.len()
    );

    MeshBuild {
        generation: req.generation,
        revision: 0,
        mesh,
        materials,
        side,
        pending,
    }
}

/// 材质最终要上传的像素
#[derive(Debug, Clone)]
pub enum FacePixels {
    Color([u8; 4]),
    Image(Arc<RgbaImage>),
}

/// 把材质解析为像素。视频取最新一帧；有文字时生成合成画布。
pub fn resolve_pixels(
    material: &Material,
    media: &MediaStore,
    font: Option<&OverlayFont>,
    placeholder: [u8; 3],
) -> FacePixels {
    let color = FacePixels::Color([placeholder[0], placeholder[1], placeholder[2], 255]);

    let frame = match material {
        Material::Placeholder => return color,
        Material::Caption(c) => {
            return FacePixels::Image(Arc::new(overlay::compose(
                None,
                placeholder,
                &c.text,
                c.position,
                font,
                OVERLAY_SIZE,
            )))
        }
        Material::Image { media: id, .. } => media.image(*id),
        Material::Video { media: id, .. } => media.video(*id).and_then(|v| v.latest_frame()),
    };

    let caption = match material {
        Material::Image { caption, .. } | Material::Video { caption, .. } => caption.as_ref(),
        _ => None,
    };

    match (frame, caption) {
        (None, _) => color,
        (Some(f), None) => FacePixels::Image(f),
        (Some(f), Some(c)) => FacePixels::Image(Arc::new(overlay::compose(
            Some(&f),
            placeholder,
            &c.text,
            c.position,
            font,
            OVERLAY_SIZE,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{VideoSettings, VideoStream};

    fn store() -> MediaStore {
        MediaStore::new(VideoSettings { frame_size: 64, ffmpeg_path: None })
    }

    fn request(scene: &Scene, shape: ShapeKind, mode: ViewMode) -> BuildRequest<'_> {
        BuildRequest {
            generation: 1,
            shape,
            params: ShapeParams::with_radius(1000.0),
            mode,
            scene,
            panorama: None,
            lock_side_faces: false,
        }
    }

    #[test]
    fn front_image_scenario() {
        let mut media = store();
        let img = media.insert_image("front.png", RgbaImage::new(4, 4));
        let mut scene = Scene::new("Scene 1");
        scene.face_mut(FaceKey::Front).media = Some(img);

        let b = build(&request(&scene, ShapeKind::Cube, ViewMode::Outside), &media);

        let s = b.mesh.size();
        assert!((s.x - 1000.0).abs() < 1e-3 && (s.y - 1000.0).abs() < 1e-3 && (s.z - 1000.0).abs() < 1e-3);
        assert_eq!(b.materials.len(), 6);
        assert_eq!(b.materials[4], Material::Image { media: img.id, caption: None });
        for (i, m) in b.materials.iter().enumerate() {
            if i != 4 {
                assert_eq!(*m, Material::Placeholder);
            }
        }

        match resolve_pixels(&b.materials[4], &media, None, [136, 136, 136]) {
            FacePixels::Image(p) => assert!(Arc::ptr_eq(&p, &media.image(img.id).unwrap())),
            other => panic!("expected image, got {other:?}"),
        }
        assert!(matches!(
            resolve_pixels(&b.materials[0], &media, None, [136, 136, 136]),
            FacePixels::Color([136, 136, 136, 255])
        ));
    }

    #[test]
    fn front_media_lands_on_positive_z_in_both_modes() {
        let mut media = store();
        let img = media.insert_image("front.png", RgbaImage::new(4, 4));
        let mut scene = Scene::new("s");
        scene.face_mut(FaceKey::Front).media = Some(img);

        for mode in [ViewMode::Outside, ViewMode::Inside] {
            let b = build(&request(&scene, ShapeKind::Cube, mode), &media);
            let slot = b.materials.iter().position(|m| m.media() == Some(img.id)).unwrap();
            for p in b.mesh.group_vertices(slot) {
                assert!((p[2] - 500.0).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn box_follows_scales() {
        let media = store();
        let scene = Scene::new("s");
        let mut req = request(&scene, ShapeKind::Cube, ViewMode::Outside);
        req.params = ShapeParams { radius: 800.0, width_scale: 2.0, height_scale: 0.5, depth_scale: 1.5 };
        let s = build(&req, &media).mesh.size();
        assert!((s.x - 1600.0).abs() < 1e-3);
        assert!((s.y - 400.0).abs() < 1e-3);
        assert!((s.z - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn side_and_mirror_flip_with_mode() {
        let media = store();
        let scene = Scene::new("s");
        let out = build(&request(&scene, ShapeKind::Cube, ViewMode::Outside), &media);
        let ins = build(&request(&scene, ShapeKind::Cube, ViewMode::Inside), &media);
        assert_eq!(out.side, Side::Front);
        assert_eq!(ins.side, Side::Back);
        assert!((out.mesh.uvs[0][0] - (1.0 - ins.mesh.uvs[0][0])).abs() < 1e-6);

        assert_eq!(side_for(ShapeKind::Sphere, ViewMode::Inside), Side::Front);
        assert_eq!(side_for(ShapeKind::Sphere, ViewMode::Outside), Side::Back);
    }

    #[test]
    fn inside_sphere_is_partial_shell() {
        let media = store();
        let scene = Scene::new("s");
        let full = build(&request(&scene, ShapeKind::Sphere, ViewMode::Outside), &media);
        let band = build(&request(&scene, ShapeKind::Sphere, ViewMode::Inside), &media);
        assert!((full.mesh.size().y - 2000.0).abs() < 1e-2);
        assert!(band.mesh.size().y < 1500.0);
        assert_eq!(full.materials, vec![Material::Placeholder]);
    }

    #[test]
    fn locked_side_faces_stay_placeholder() {
        let mut media = store();
        let img = media.insert_image("l.png", RgbaImage::new(2, 2));
        let mut scene = Scene::new("s");
        scene.face_mut(FaceKey::Left).media = Some(img);
        scene.face_mut(FaceKey::Top).media = Some(img);
        let mut req = request(&scene, ShapeKind::Cube, ViewMode::Outside);
        req.lock_side_faces = true;
        let b = build(&req, &media);
        assert_eq!(b.materials[0], Material::Placeholder);
        assert_eq!(b.materials[2].media(), Some(img.id));
    }

    #[test]
    fn video_waits_for_first_frame() {
        let mut media = store();
        let v = media.insert_video("clip.mp4", VideoStream::detached());
        let mut scene = Scene::new("s");
        scene.face_mut(FaceKey::Back).media = Some(v);

        let mut b = build(&request(&scene, ShapeKind::Cube, ViewMode::Outside), &media);
        assert_eq!(b.materials[5], Material::Placeholder);
        assert_eq!(b.pending.len(), 1);
        assert!(!b.promote_ready(&media));

        media.video(v.id).unwrap().push_frame(RgbaImage::new(2, 2));
        assert!(b.promote_ready(&media));
        assert!(b.materials[5].is_video());
        assert!(b.pending.is_empty());
        assert_eq!(b.revision, 1);
    }

    #[test]
    fn caption_without_media_is_composited() {
        let media = store();
        let mut scene = Scene::new("s");
        scene.face_mut(FaceKey::Top).overlay_text = "hola".into();
        scene.face_mut(FaceKey::Top).text_position = TextPosition::Top;
        let b = build(&request(&scene, ShapeKind::Cube, ViewMode::Outside), &media);
        assert!(matches!(&b.materials[2], Material::Caption(c) if c.position == TextPosition::Top));
        match resolve_pixels(&b.materials[2], &media, None, [1, 2, 3]) {
            FacePixels::Image(img) => assert_eq!(img.dimensions(), (OVERLAY_SIZE, OVERLAY_SIZE)),
            other => panic!("expected composite, got {other:?}"),
        }
    }

    #[test]
    fn caption_patch_touches_one_slot() {
        let mut media = store();
        let img = media.insert_image("front.png", RgbaImage::new(2, 2));
        let pending = media.insert_pending("back.png");
        let mut scene = Scene::new("s");
        scene.face_mut(FaceKey::Front).media = Some(img);
        scene.face_mut(FaceKey::Back).media = Some(pending);
        let mut b = build(&request(&scene, ShapeKind::Cube, ViewMode::Outside), &media);
        let before = b.materials.clone();

        let hello = Caption { text: "hello".into(), position: TextPosition::Bottom };
        assert!(b.set_caption(4, Some(hello.clone())));
        assert_eq!(b.materials[4], Material::Image { media: img.id, caption: Some(hello.clone()) });
        assert_eq!(b.revision, 1);
        for i in [0, 1, 2, 3, 5] {
            assert_eq!(b.materials[i], before[i]);
        }
        // 相同文字不算改动
        assert!(!b.set_caption(4, Some(hello.clone())));
        assert_eq!(b.revision, 1);

        // 等待中的槽位先显示文字，就绪后仍带着文字
        assert!(b.set_caption(5, Some(hello.clone())));
        assert_eq!(b.materials[5], Material::Caption(hello.clone()));
        media.store_decoded(pending.id, Ok(RgbaImage::new(2, 2)));
        assert!(b.promote_ready(&media));
        assert_eq!(b.materials[5], Material::Image { media: pending.id, caption: Some(hello) });

        assert!(!b.set_caption(0, None));
    }
}
