// input.rs — 键盘 / 鼠标到离散动作的映射

use winit::event::{MouseScrollDelta, VirtualKeyCode};

pub const KEY_ROTATE_STEP: f32 = 0.02;
pub const MAX_PITCH: f32 = std::f32::consts::PI / 2.5;
pub const MIN_FOV: f32 = 30.0;
pub const MAX_FOV: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
    ToggleMode,
    EnterInside,
    ExitOutside,
    NextPanorama,
    ToggleShape,
    NextScene,
    PrevScene,
    ToggleVideoPause,
    TogglePanel,
    OpenMedia,
    ToggleFullscreen,
}

/// 一个键只对应一个动作
pub fn action_for_key(key: VirtualKeyCode) -> Option<Action> {
    let action = match key {
        VirtualKeyCode::Left => Action::YawLeft,
        VirtualKeyCode::Right => Action::YawRight,
        VirtualKeyCode::Up => Action::PitchUp,
        VirtualKeyCode::Down => Action::PitchDown,
        VirtualKeyCode::PageUp => Action::ToggleMode,
        VirtualKeyCode::Return => Action::EnterInside,
        VirtualKeyCode::Escape => Action::ExitOutside,
        VirtualKeyCode::PageDown => Action::NextPanorama,
        VirtualKeyCode::C => Action::ToggleShape,
        VirtualKeyCode::N => Action::NextScene,
        VirtualKeyCode::P => Action::PrevScene,
        VirtualKeyCode::Space => Action::ToggleVideoPause,
        VirtualKeyCode::H => Action::TogglePanel,
        VirtualKeyCode::O => Action::OpenMedia,
        VirtualKeyCode::F11 => Action::ToggleFullscreen,
        _ => return None,
    };
    Some(action)
}

/// 按住左键拖拽时的状态
#[derive(Debug, Default)]
pub struct DragState {
    pressed: bool,
    last_x: Option<f64>,
}

impl DragState {
    pub fn set_pressed(&mut self, pressed: bool) {
        self.pressed = pressed;
        if !pressed {
            self.last_x = None;
        }
    }

    /// 返回本次移动的水平像素增量；未按下或首个采样时返回 None
    pub fn moved_to(&mut self, x: f64) -> Option<f32> {
        if !self.pressed {
            return None;
        }
        let dx = self.last_x.map(|last| (x - last) as f32);
        self.last_x = Some(x);
        dx
    }
}

/// 滚轮增量换算为“格”
pub fn scroll_lines(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
    }
}

pub fn zoomed_fov(fov: f32, lines: f32, sensitivity: f32) -> f32 {
    (fov - lines * sensitivity).clamp(MIN_FOV, MAX_FOV)
}
