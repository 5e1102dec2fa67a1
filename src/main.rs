// main.rs — 窗口、事件循环、控制面板

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

mod builder;
mod camera;
mod config;
mod error;
mod i18n;
mod input;
mod media;
mod mesh;
mod overlay;
mod renderer;
mod scene;
mod state;
mod video;

use builder::{ShapeKind, ShapeParams};
use camera::ViewMode;
use config::ViewerConfig;
use input::DragState;
use overlay::OverlayFont;
use renderer::Renderer;
use scene::{FaceKey, TextPosition};
use state::{AppState, HostRequest};

use winit::{
    dpi::LogicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowBuilder},
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config = ViewerConfig::resolve(&args);
    let mut current_lang = config.lang.clone();
    i18n::init(&current_lang);

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(i18n::tr("app.title"))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone()))?;
    let mut state = AppState::new(config);
    state.set_aspect(renderer.size.width, renderer.size.height);
    let font = OverlayFont::discover();

    let mut drag = DragState::default();
    let mut is_fullscreen = false;

    // FPS 计算
    let mut last_frame_time = Instant::now();
    let mut frame_count = 0;
    let mut fps = 0.0;
    let mut show_fps = false;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;

        match event {
            Event::WindowEvent { event, .. } => {
                // 先让 egui 处理事件
                let response = renderer.egui_state.on_event(&renderer.egui_ctx, &event);
                if response.consumed {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        state.set_aspect(new_size.width, new_size.height);
                    }

                    WindowEvent::KeyboardInput { input: key, .. } => {
                        if key.state != ElementState::Pressed {
                            return;
                        }
                        let Some(action) = key.virtual_keycode.and_then(input::action_for_key) else {
                            return;
                        };
                        match state.apply(action) {
                            Some(HostRequest::OpenMediaDialog) => {
                                if let Some(paths) = pick_media_files() {
                                    state.load_panoramas(paths);
                                }
                            }
                            Some(HostRequest::ToggleFullscreen) => {
                                is_fullscreen = !is_fullscreen;
                                set_fullscreen(&window, is_fullscreen);
                            }
                            None => {}
                        }
                    }

                    WindowEvent::MouseInput { state: button_state, button, .. } => {
                        if button == MouseButton::Left {
                            drag.set_pressed(button_state == ElementState::Pressed);
                        }
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        if let Some(dx) = drag.moved_to(position.x) {
                            state.drag(dx);
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        state.zoom(input::scroll_lines(delta));
                    }

                    WindowEvent::DroppedFile(path) => {
                        state.add_panorama(path);
                    }

                    _ => {}
                }
            }

            Event::RedrawRequested(_) => {
                frame_count += 1;
                let now = Instant::now();
                if now.duration_since(last_frame_time).as_secs_f32() >= 1.0 {
                    fps = frame_count as f32 / now.duration_since(last_frame_time).as_secs_f32();
                    frame_count = 0;
                    last_frame_time = now;
                }

                state.frame_tick();
                renderer.sync(
                    state.current_build(),
                    &state.media,
                    font.as_ref(),
                    state.config.placeholder_color,
                );
                renderer.update_camera(state.view_proj() * state.rotation.model());

                let mut fullscreen_clicked = false;
                let render_result = renderer.render_with_ui(&window, |ctx| {
                    draw_ui(
                        ctx,
                        &mut state,
                        &mut show_fps,
                        &mut fullscreen_clicked,
                        fps,
                        &window,
                        &mut current_lang,
                    );
                });

                if fullscreen_clicked {
                    is_fullscreen = !is_fullscreen;
                    set_fullscreen(&window, is_fullscreen);
                }

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => renderer.resize(renderer.size),
                    Err(wgpu::SurfaceError::OutOfMemory) => *control_flow = ControlFlow::Exit,
                    Err(e) => log::error!("render error: {:?}", e),
                }
            }

            Event::MainEventsCleared => {
                window.request_redraw();
            }

            _ => {}
        }
    });
}

fn set_fullscreen(window: &Window, on: bool) {
    if on {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
    } else {
        window.set_fullscreen(None);
    }
}

fn media_dialog() -> rfd::FileDialog {
    let mut all: Vec<&str> = IMAGE_EXTENSIONS.to_vec();
    all.extend(video::VIDEO_EXTENSIONS);
    rfd::FileDialog::new()
        .add_filter(&i18n::tr("file.filter.media"), &all[..])
        .add_filter(&i18n::tr("file.filter.images"), &IMAGE_EXTENSIONS)
        .add_filter(&i18n::tr("file.filter.videos"), &video::VIDEO_EXTENSIONS)
}

fn pick_media_files() -> Option<Vec<PathBuf>> {
    media_dialog().pick_files()
}

fn pick_media_file() -> Option<PathBuf> {
    media_dialog().pick_file()
}

fn draw_ui(
    ctx: &egui::Context,
    state: &mut AppState,
    show_fps: &mut bool,
    fullscreen_clicked: &mut bool,
    fps: f32,
    window: &Window,
    current_lang: &mut String,
) {
    egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            // File
            ui.menu_button(i18n::tr("menu.file"), |ui| {
                if ui.button(i18n::tr("menu.open_panoramas")).clicked() {
                    ui.close_menu();
                    if let Some(paths) = pick_media_files() {
                        state.load_panoramas(paths);
                    }
                }
                if ui.button(i18n::tr("menu.exit")).clicked() {
                    std::process::exit(0);
                }
            });

            // View
            ui.menu_button(i18n::tr("menu.view"), |ui| {
                if ui.button(i18n::tr("view.reset")).clicked() {
                    state.rotation = Default::default();
                    state.camera.fov = match state.mode {
                        ViewMode::Outside => state.config.base_fov,
                        ViewMode::Inside => state::inside_fov(state.params.radius),
                    };
                    ui.close_menu();
                }
                if ui.button(i18n::tr("view.fullscreen")).clicked() {
                    *fullscreen_clicked = true;
                    ui.close_menu();
                }
                if ui
                    .checkbox(&mut state.panel_visible, i18n::tr("view.show_panel"))
                    .clicked()
                {
                    ui.close_menu();
                }
                if ui.checkbox(show_fps, i18n::tr("view.show_fps")).clicked() {
                    ui.close_menu();
                }
            });

            // Language
            ui.menu_button(i18n::tr("menu.language"), |ui| {
                for (code, name) in i18n::LANGUAGES {
                    if ui.radio_value(current_lang, code.to_string(), name).clicked() {
                        i18n::init(current_lang);
                        window.set_title(&i18n::tr("app.title"));
                        ui.close_menu();
                    }
                }
            });
        });
    });

    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let mode = match state.mode {
                ViewMode::Outside => i18n::tr("mode.outside"),
                ViewMode::Inside => i18n::tr("mode.inside"),
            };
            let shape = match state.shape {
                ShapeKind::Sphere => i18n::tr("shape.sphere"),
                ShapeKind::Cube => i18n::tr("shape.cube"),
            };
            ui.label(format!("{mode} · {shape}"));
            ui.label("|");
            ui.label(format!("FOV: {:.1}°", state.camera.fov));
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", state.rotation.yaw.to_degrees()));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", state.rotation.pitch.to_degrees()));
            ui.label("|");
            ui.label(i18n::tr_with(
                "status.scene",
                &[
                    ("index", (state.scenes.current_index() + 1).to_string()),
                    ("count", state.scenes.len().to_string()),
                ],
            ));
            if state.media.videos_paused() {
                ui.label("|");
                ui.label(egui::RichText::new(i18n::tr("status.videos_paused")).color(egui::Color32::YELLOW));
            }
            if *show_fps {
                ui.label("|");
                ui.label(egui::RichText::new(format!("FPS: {:.1}", fps)).color(egui::Color32::GREEN));
            }
        });
    });

    if !state.panel_visible {
        return;
    }

    egui::SidePanel::left("controls").resizable(true).show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            draw_view_controls(ui, state);
            ui.separator();
            draw_shape_controls(ui, state);
            ui.separator();
            match state.shape {
                ShapeKind::Sphere => draw_panorama_controls(ui, state),
                ShapeKind::Cube => {
                    draw_scene_controls(ui, state);
                    ui.separator();
                    draw_face_controls(ui, state);
                }
            }
        });
    });
}

fn draw_view_controls(ui: &mut egui::Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        let label = match state.mode {
            ViewMode::Outside => i18n::tr("button.enter_inside"),
            ViewMode::Inside => i18n::tr("button.exit_outside"),
        };
        if ui.button(label).clicked() {
            state.toggle_mode();
        }
        let pause = if state.media.videos_paused() {
            i18n::tr("button.resume_videos")
        } else {
            i18n::tr("button.pause_videos")
        };
        if ui.button(pause).clicked() {
            state.toggle_video_pause();
        }
    });

    let mut shape = state.shape;
    ui.horizontal(|ui| {
        ui.radio_value(&mut shape, ShapeKind::Sphere, i18n::tr("shape.sphere"));
        ui.radio_value(&mut shape, ShapeKind::Cube, i18n::tr("shape.cube"));
    });
    state.set_shape(shape);
}

fn draw_shape_controls(ui: &mut egui::Ui, state: &mut AppState) {
    let mut p: ShapeParams = state.params;
    ui.add(egui::Slider::new(&mut p.radius, ShapeParams::RADIUS_RANGE).text(i18n::tr("slider.radius")));
    if state.shape == ShapeKind::Cube {
        ui.add(egui::Slider::new(&mut p.width_scale, ShapeParams::SCALE_RANGE).text(i18n::tr("slider.width")));
        ui.add(egui::Slider::new(&mut p.height_scale, ShapeParams::SCALE_RANGE).text(i18n::tr("slider.height")));
        ui.add(egui::Slider::new(&mut p.depth_scale, ShapeParams::SCALE_RANGE).text(i18n::tr("slider.depth")));
    }
    state.set_params(p);
}

fn draw_panorama_controls(ui: &mut egui::Ui, state: &mut AppState) {
    if ui.button(i18n::tr("menu.open_panoramas")).clicked() {
        if let Some(paths) = pick_media_files() {
            state.load_panoramas(paths);
        }
    }
    let count = state.panorama_count();
    if count > 0 {
        ui.horizontal(|ui| {
            if ui.button("◀").clicked() {
                state.cycle_panorama(-1);
            }
            ui.label(i18n::tr_with(
                "status.panorama",
                &[
                    ("index", (state.panorama_index() + 1).to_string()),
                    ("count", count.to_string()),
                ],
            ));
            if ui.button("▶").clicked() {
                state.cycle_panorama(1);
            }
        });
    }
}

fn draw_scene_controls(ui: &mut egui::Ui, state: &mut AppState) {
    ui.label(egui::RichText::new(i18n::tr("panel.scenes")).strong());
    let current = state.scenes.current_index();
    let names: Vec<String> = state.scenes.iter().map(|s| s.name.clone()).collect();
    let mut selected = None;
    for (i, name) in names.iter().enumerate() {
        if ui.selectable_label(i == current, name).clicked() {
            selected = Some(i);
        }
    }
    if let Some(i) = selected {
        state.select_scene(i);
    }
    ui.horizontal(|ui| {
        if ui.button(i18n::tr("button.add_scene")).clicked() {
            state.add_scene();
        }
        let can_delete = state.scenes.len() > 1;
        if ui
            .add_enabled(can_delete, egui::Button::new(i18n::tr("button.delete_scene")))
            .clicked()
        {
            state.delete_scene();
        }
    });
}

fn draw_face_controls(ui: &mut egui::Ui, state: &mut AppState) {
    for face in FaceKey::ALL {
        let assignment = state.scenes.current().face(face).clone();
        let locked = state.config.lock_side_faces && matches!(face, FaceKey::Left | FaceKey::Right);

        ui.push_id(face.box_index(), |ui| {
            ui.label(egui::RichText::new(i18n::tr(face.i18n_key())).strong());
            if locked {
                ui.label(i18n::tr("panel.face_locked"));
                return;
            }

            ui.horizontal(|ui| {
                if ui.button(i18n::tr("button.choose_file")).clicked() {
                    if let Some(path) = pick_media_file() {
                        state.assign_face_media(face, path);
                    }
                }
                if assignment.media.is_some() && ui.button("✕").clicked() {
                    state.clear_face_media(face);
                }
            });

            let mut text = assignment.overlay_text.clone();
            if ui
                .add(egui::TextEdit::singleline(&mut text).hint_text(i18n::tr("panel.overlay_hint")))
                .changed()
            {
                state.set_face_text(face, text);
            }

            let mut position = assignment.text_position;
            egui::ComboBox::from_label(i18n::tr("panel.text_position"))
                .selected_text(match position {
                    TextPosition::Top => i18n::tr("position.top"),
                    TextPosition::Bottom => i18n::tr("position.bottom"),
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut position, TextPosition::Top, i18n::tr("position.top"));
                    ui.selectable_value(&mut position, TextPosition::Bottom, i18n::tr("position.bottom"));
                });
            state.set_text_position(face, position);
        });
        ui.add_space(4.0);
    }
}
