// scene.rs — 场景列表与立方体各面的素材分配

use std::fmt;

/// 每次用户选择文件都会分配新的 id；旧 id 对应的资源随之释放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRef {
    pub id: MediaId,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceKey {
    Left,
    Right,
    Top,
    Bottom,
    Front,
    Back,
}

impl FaceKey {
    /// 按盒子面索引排列
    pub const ALL: [FaceKey; 6] = [
        FaceKey::Left,
        FaceKey::Right,
        FaceKey::Top,
        FaceKey::Bottom,
        FaceKey::Front,
        FaceKey::Back,
    ];

    /// 面 -> 盒子几何的材质索引。已有内容按这个顺序制作，不能改。
    pub fn box_index(self) -> usize {
        match self {
            FaceKey::Left => 0,
            FaceKey::Right => 1,
            FaceKey::Top => 2,
            FaceKey::Bottom => 3,
            FaceKey::Front => 4,
            FaceKey::Back => 5,
        }
    }

    pub fn i18n_key(self) -> &'static str {
        match self {
            FaceKey::Left => "face.left",
            FaceKey::Right => "face.right",
            FaceKey::Top => "face.top",
            FaceKey::Bottom => "face.bottom",
            FaceKey::Front => "face.front",
            FaceKey::Back => "face.back",
        }
    }
}

impl fmt::Display for FaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPosition {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceAssignment {
    pub media: Option<MediaRef>,
    pub overlay_text: String,
    pub text_position: TextPosition,
}

impl FaceAssignment {
    pub fn has_overlay(&self) -> bool {
        !self.overlay_text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub name: String,
    faces: [FaceAssignment; 6],
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Default::default(),
        }
    }

    pub fn face(&self, key: FaceKey) -> &FaceAssignment {
        &self.faces[key.box_index()]
    }

    pub fn face_mut(&mut self, key: FaceKey) -> &mut FaceAssignment {
        &mut self.faces[key.box_index()]
    }

    /// 本场景引用的全部素材
    pub fn media(&self) -> impl Iterator<Item = MediaRef> + '_ {
        self.faces.iter().filter_map(|f| f.media)
    }
}

/// 有序场景列表。不变式：至少一个场景，current 始终有效。
#[derive(Debug, Clone)]
pub struct SceneList {
    scenes: Vec<Scene>,
    current: usize,
    next_number: usize,
}

impl Default for SceneList {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneList {
    pub fn new() -> Self {
        Self {
            scenes: vec![Scene::new("Scene 1")],
            current: 0,
            next_number: 2,
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &Scene {
        &self.scenes[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Scene {
        &mut self.scenes[self.current]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    /// 追加一个空场景并设为当前
    pub fn add(&mut self) {
        let name = format!("Scene {}", self.next_number);
        self.next_number += 1;
        self.scenes.push(Scene::new(name));
        self.current = self.scenes.len() - 1;
    }

    /// 删除当前场景，返回被删除的场景以便释放其素材。只剩一个时拒绝。
    pub fn delete_current(&mut self) -> Option<Scene> {
        if self.scenes.len() <= 1 {
            return None;
        }
        let removed = self.scenes.remove(self.current);
        self.current = self.current.min(self.scenes.len() - 1);
        Some(removed)
    }

    /// 越界时不做任何事并返回 false
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.scenes.len() {
            return false;
        }
        self.current = index;
        true
    }

    pub fn select_next(&mut self) {
        self.current = (self.current + 1) % self.scenes.len();
    }

    pub fn select_prev(&mut self) {
        self.current = (self.current + self.scenes.len() - 1) % self.scenes.len();
    }

    /// 任何场景是否还在引用该素材
    pub fn references(&self, id: MediaId) -> bool {
        self.scenes.iter().any(|s| s.media().any(|m| m.id == id))
    }
}
