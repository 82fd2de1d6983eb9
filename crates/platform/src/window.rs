//! winit window driven by explicit event pumping.

use std::ffi::c_char;
use std::sync::Arc;
use std::time::Duration;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use bento_core::{Error, Result};

use crate::surface::Surface;

/// Pumps allowed while waiting for the platform to hand out the window.
const CREATE_ATTEMPTS: usize = 16;
const CREATE_PUMP_TIMEOUT: Duration = Duration::from_millis(10);

/// Anything that can report a framebuffer size and block for events.
///
/// The swapchain rebuild path only needs these two capabilities, which lets
/// it run against a fake window in tests.
pub trait FramebufferSource {
    /// Current framebuffer size in pixels. Zero while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Blocks until at least one window event has been processed.
    fn wait_events(&mut self);
}

/// Event-derived window state, updated by the pump.
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Arc<WinitWindow>>,
    creation_error: Option<String>,
    size: PhysicalSize<u32>,
    resized: bool,
    close_requested: bool,
}

impl WindowState {
    fn new(attributes: WindowAttributes, size: PhysicalSize<u32>) -> Self {
        Self {
            attributes,
            window: None,
            creation_error: None,
            size,
            resized: false,
            close_requested: false,
        }
    }

    fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Window close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized: {}x{}", size.width, size.height);
                self.size = *size;
                self.resized = true;
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.size = window.inner_size();
                self.window = Some(Arc::new(window));
            }
            Err(e) => self.creation_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.handle_event(&event);
    }
}

/// A single resizable window plus the event loop feeding it.
pub struct Window {
    // Field order matters: the window must drop before its event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Window {
    /// Opens a resizable window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the event loop cannot be created, the
    /// platform refuses the window, or it never arrives.
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;

        let size = PhysicalSize::new(width, height);
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(size)
            .with_resizable(true);

        let mut this = Self {
            state: WindowState::new(attributes, size),
            event_loop,
        };

        for _ in 0..CREATE_ATTEMPTS {
            if this.state.window.is_some() || this.state.creation_error.is_some() {
                break;
            }
            this.pump(Some(CREATE_PUMP_TIMEOUT));
        }

        if let Some(e) = this.state.creation_error.take() {
            return Err(Error::Window(e));
        }
        if this.state.window.is_none() {
            return Err(Error::Window(
                "platform did not resume the event loop".to_string(),
            ));
        }

        info!("Window created: \"{}\" {}x{}", title, width, height);
        Ok(this)
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        let status = self.event_loop.pump_app_events(timeout, &mut self.state);
        if let PumpStatus::Exit(code) = status {
            warn!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    /// Processes pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    /// Whether the user asked to close the window.
    pub fn should_close(&self) -> bool {
        self.state.close_requested
    }

    /// Returns and clears the "resized since last asked" flag.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }

    fn winit_window(&self) -> Result<&WinitWindow> {
        self.state
            .window
            .as_deref()
            .ok_or_else(|| Error::Window("window has not been created".to_string()))
    }

    /// Instance extensions needed to create a surface for this window.
    ///
    /// The pointers reference static strings owned by `ash-window`.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self
            .winit_window()?
            .display_handle()
            .map_err(|e| Error::Window(format!("no display handle: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| Error::Surface(format!("cannot enumerate surface extensions: {}", e)))?;

        Ok(extensions.to_vec())
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] for missing raw handles or
    /// [`Error::Surface`] if Vulkan rejects the surface.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let window = self.winit_window()?;
        let display = window
            .display_handle()
            .map_err(|e| Error::Window(format!("no display handle: {}", e)))?;
        let handle = window
            .window_handle()
            .map_err(|e| Error::Window(format!("no window handle: {}", e)))?;

        // SAFETY: both handles come from a live winit window, and the surface
        // is destroyed by Surface::drop before the instance goes away.
        let surface = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), handle.as_raw(), None)
                .map_err(|e| Error::Surface(e.to_string()))?
        };

        info!("Vulkan surface created");
        Ok(Surface::new(
            surface,
            ash::khr::surface::Instance::new(entry, instance),
        ))
    }
}

impl FramebufferSource for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        match self.state.window.as_deref() {
            Some(window) => {
                let size = window.inner_size();
                (size.width, size.height)
            }
            None => (self.state.size.width, self.state.size.height),
        }
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }
}
