use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::game::Game;
use crate::gpu::GpuContext;
use crate::input::Input;

/// Scroll pixels treated as one wheel line on touchpads.
const PIXELS_PER_LINE: f32 = 40.0;

/// Open the window, run the game until it exits, and return the first error that
/// stopped it.
pub fn run(config: AppConfig) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = SkybounceApp::Pending {
        config: Box::new(config),
    };
    event_loop.run_app(&mut app)?;

    match app {
        SkybounceApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

enum SkybounceApp {
    Pending {
        config: Box<AppConfig>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        game: Box<Game>,
        input: Input,
        last_frame: Instant,
    },
    Failed(Error),
    Finished,
}

impl SkybounceApp {
    fn start(config: &AppConfig, event_loop: &ActiveEventLoop) -> Result<Self> {
        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let gpu = GpuContext::new(window.clone())?;
        let game = Game::new(&gpu, &config.game)?;
        log::info!("Started at {}x{}", gpu.width(), gpu.height());

        Ok(SkybounceApp::Running {
            window,
            gpu,
            game: Box::new(game),
            input: Input::new(),
            last_frame: Instant::now(),
        })
    }
}

impl ApplicationHandler for SkybounceApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let SkybounceApp::Pending { config } = self {
            *self = match Self::start(config, event_loop) {
                Ok(running) => running,
                Err(err) => {
                    event_loop.exit();
                    SkybounceApp::Failed(err)
                }
            };
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let SkybounceApp::Running {
            window,
            gpu,
            game,
            input,
            last_frame,
        } = self
        else {
            return;
        };

        input.handle_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if gpu.resize(size.width, size.height) {
                    game.resize(gpu);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => game.mouse_pressed(button, input.mouse_position()),
                ElementState::Released => game.mouse_released(button),
            },
            WindowEvent::CursorMoved { position, .. } => {
                game.mouse_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                game.mouse_wheel(lines);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                game.update(dt, input);
                if game.is_exit() {
                    log::info!("Exiting with score {}", game.score());
                    event_loop.exit();
                    *self = SkybounceApp::Finished;
                    return;
                }

                match game.draw(gpu) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        log::debug!("Surface lost or outdated, reconfiguring");
                        gpu.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory, exiting");
                        event_loop.exit();
                    }
                    Err(err) => log::warn!("Skipped frame: {err}"),
                }

                window.request_redraw();
            }
            _ => {}
        }
    }
}
