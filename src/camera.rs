// camera.rs — 内/外视角切换与相机过渡动画

use glam::{Mat4, Vec3};

pub const TRANSITION_FRAMES: u32 = 60;

pub const NEAR: f32 = 0.1;
/// 远裁剪面的下限，实际值随形状尺寸放大
pub const FAR: f32 = 5000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Outside,
    Inside,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Outside => ViewMode::Inside,
            ViewMode::Inside => ViewMode::Outside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransition {
    pub start: Vec3,
    pub target: Vec3,
    pub progress: u32,
    pub duration: u32,
}

impl CameraTransition {
    pub fn fraction(&self) -> f32 {
        (self.progress as f32 / self.duration as f32).min(1.0)
    }
}

/// 相机位置 + 至多一个进行中的过渡；每帧调用一次 `tick`。
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub position: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub far: f32,
    transition: Option<CameraTransition>,
}

impl CameraRig {
    pub fn new(position: Vec3, fov: f32) -> Self {
        Self {
            position,
            fov,
            aspect: 16.0 / 9.0,
            far: FAR,
            transition: None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    #[cfg(test)]
    pub fn transition(&self) -> Option<&CameraTransition> {
        self.transition.as_ref()
    }

    /// 改变进行中过渡的终点，起点与进度保持不变
    pub fn retarget(&mut self, target: Vec3) {
        if let Some(t) = self.transition.as_mut() {
            t.target = target;
        }
    }

    /// 从当前位置开始新的过渡，覆盖正在进行的过渡
    pub fn start_transition(&mut self, target: Vec3) {
        self.transition = Some(CameraTransition {
            start: self.position,
            target,
            progress: 0,
            duration: TRANSITION_FRAMES,
        });
    }

    pub fn tick(&mut self) {
        let Some(t) = self.transition.as_mut() else {
            return;
        };
        t.progress += 1;
        let f = t.fraction();
        self.position = t.start.lerp(t.target, f);
        if f >= 1.0 {
            self.position = t.target;
            self.transition = None;
        }
    }

    /// 始终朝向原点；位于原点时朝 -Z 看
    pub fn view(&self) -> Mat4 {
        if self.position.length_squared() < 1e-6 {
            Mat4::look_to_rh(self.position, Vec3::NEG_Z, Vec3::Y)
        } else {
            Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect.max(1e-3), NEAR, self.far.max(FAR))
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}
