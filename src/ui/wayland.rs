use std::io::Write;
use anyhow::Context;
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    data_device_manager::{
        data_device::{DataDevice, DataDeviceHandler},
        data_offer::{DataOfferHandler, DragOffer},
        data_source::{DataSourceHandler, DragSource},
        DataDeviceManagerState, WritePipe,
    },
    delegate_compositor, delegate_data_device, delegate_keyboard, delegate_layer, delegate_output,
    delegate_pointer, delegate_registry, delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler, BTN_LEFT},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{LayerShell, LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
        WaylandSurface,
    },
    shm::{slot::SlotPool, Shm, ShmHandler},
};
use wayland_client::{
    globals::GlobalList,
    protocol::{
        wl_data_device::WlDataDevice,
        wl_data_device_manager::DndAction,
        wl_data_source::WlDataSource,
        wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface,
    },
    Connection, QueueHandle,
};
use xkbcommon::xkb::{self, keysyms};
use quickrun::activation::{drag_payload, DragPayload};
use quickrun::config::Config;
use quickrun::executor::Spawner;
use quickrun::orchestrator::Reply;
use quickrun::{Launcher, Outcome, Trigger};
use crate::ui::render::Renderer;
use crate::ui::view::{Layout, View};

/// Pointer travel before a press on a draggable row turns into a drag.
const DRAG_THRESHOLD: f64 = 8.0;

type ReplySender = calloop::channel::Sender<Reply>;

struct Press {
    index: usize,
    x: f64,
    y: f64,
    serial: u32,
}

struct ActiveDrag {
    _source: DragSource,
    payload: DragPayload,
}

pub struct WaylandApp {
    pub registry_state: RegistryState,
    pub seat_state: SeatState,
    pub output_state: OutputState,
    pub compositor_state: CompositorState,
    pub shm_state: Shm,
    pub layer_shell_state: LayerShell,
    data_device_manager: Option<DataDeviceManagerState>,
    data_device: Option<DataDevice>,

    pub layer_surface: Option<LayerSurface>,
    pub pool: Option<SlotPool>,
    pub width: u32,
    pub height: u32,
    pub first_configure: bool,
    pub should_exit: bool,

    pub config: Config,
    pub launcher: Launcher<Spawner>,
    pub view: View,
    pub renderer: Renderer,
    replies: ReplySender,

    ctrl: bool,
    press: Option<Press>,
    drag: Option<ActiveDrag>,
}

impl WaylandApp {
    pub fn new(
        globals: &GlobalList,
        qh: &QueueHandle<Self>,
        config: Config,
        launcher: Launcher<Spawner>,
        renderer: Renderer,
        replies: ReplySender,
    ) -> anyhow::Result<Self> {
        let compositor_state = CompositorState::bind(globals, qh).context("wl_compositor not available")?;
        let shm_state = Shm::bind(globals, qh).context("wl_shm not available")?;
        let layer_shell_state = LayerShell::bind(globals, qh).context("zwlr_layer_shell_v1 not available")?;
        let data_device_manager = match DataDeviceManagerState::bind(globals, qh) {
            Ok(manager) => Some(manager),
            Err(e) => {
                log::warn!("wl_data_device_manager not available, drag disabled: {}", e);
                None
            }
        };

        Ok(Self {
            registry_state: RegistryState::new(globals),
            seat_state: SeatState::new(globals, qh),
            output_state: OutputState::new(globals, qh),
            compositor_state,
            shm_state,
            layer_shell_state,
            data_device_manager,
            data_device: None,
            layer_surface: None,
            pool: None,
            width: config.theme.width,
            height: config.theme.height,
            first_configure: true,
            should_exit: false,
            config,
            launcher,
            view: View::new(),
            renderer,
            replies,
            ctrl: false,
            press: None,
            drag: None,
        })
    }

    pub fn draw(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>) {
        let Some(layer_surface) = &self.layer_surface else {
            return;
        };
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return;
        }
        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            (width * 4) as i32,
            wl_shm::Format::Argb8888,
        ) {
            Ok(created) => created,
            Err(e) => {
                log::error!("Failed to create buffer: {}", e);
                return;
            }
        };

        if let Some(mut pixmap) = tiny_skia::PixmapMut::from_bytes(canvas, width, height) {
            self.renderer.draw(&mut pixmap, &self.view, &self.config.theme);

            // RGBA -> BGRA
            for chunk in canvas.chunks_exact_mut(4) {
                chunk.swap(0, 2);
            }

            let surface = layer_surface.wl_surface();
            surface.attach(Some(buffer.wl_buffer()), 0, 0);
            surface.damage(0, 0, width as i32, height as i32);
            surface.commit();
        }
    }

    /// A module reply arrived on the calloop channel.
    pub fn on_reply(&mut self, reply: Reply) {
        self.launcher.reply(reply, &mut self.view);
    }

    /// Schedules a redraw if anything changed and notes when the session ended.
    pub fn flush(&mut self, qh: &QueueHandle<Self>) {
        if !self.launcher.session().is_visible() {
            self.should_exit = true;
        }
        if !self.view.take_dirty() {
            return;
        }
        if let Some(layer_surface) = &self.layer_surface {
            let surface = layer_surface.wl_surface();
            surface.frame(qh, surface.clone());
            surface.commit();
        }
    }

    fn search(&mut self) {
        let term = self.view.query.clone();
        self.launcher.input(&term, &self.replies, &mut self.view);
    }

    fn trigger(&mut self, trigger: Trigger) {
        let outcome = self.launcher.trigger(trigger, &self.replies, &mut self.view);
        if let Outcome::Pinned(module) = outcome {
            log::debug!("Input now goes to '{}' only", module);
            self.view.query.clear();
            self.view.mark_dirty();
        }
    }

    fn layout(&self) -> Layout {
        Layout::new(&self.config.theme, self.width, self.height, self.view.rows.len(), self.view.selected)
    }

    fn row_at(&self, x: f64, y: f64) -> Option<usize> {
        if !self.view.list_visible {
            return None;
        }
        self.layout().row_at(x, y, self.view.rows.len())
    }

    fn start_drag(&mut self, qh: &QueueHandle<Self>, press: &Press) {
        let (Some(manager), Some(device), Some(layer_surface)) =
            (&self.data_device_manager, &self.data_device, &self.layer_surface)
        else {
            return;
        };
        let Some(payload) = self.launcher.list().entry(press.index).and_then(drag_payload) else {
            return;
        };

        let source = manager.create_drag_and_drop_source(qh, [payload.mime], DndAction::Copy);
        source.start_drag(device, layer_surface.wl_surface(), None, press.serial);
        self.drag = Some(ActiveDrag { _source: source, payload });
        self.trigger(Trigger::DragBegin { index: press.index });
    }

    fn end_drag(&mut self) {
        if self.drag.take().is_some() {
            self.trigger(Trigger::DragEnd);
        }
    }
}

impl LayerShellHandler for WaylandApp {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        self.should_exit = true;
    }

    fn configure(
        &mut self,
        conn: &Connection,
        qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        if configure.new_size.0 > 0 {
            self.width = configure.new_size.0;
        }
        if configure.new_size.1 > 0 {
            self.height = configure.new_size.1;
        }

        let needed = (self.width * self.height * 4) as usize;
        if self.first_configure {
            self.first_configure = false;
            match SlotPool::new(needed, &self.shm_state) {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    log::error!("Failed to create shm pool: {}", e);
                    self.should_exit = true;
                    return;
                }
            }
        }

        if let Some(pool) = &mut self.pool {
            if pool.len() < needed {
                if let Err(e) = pool.resize(needed) {
                    log::error!("Failed to grow shm pool: {}", e);
                    return;
                }
            }
        }

        self.draw(conn, qh);
    }
}

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {}

    fn frame(
        &mut self,
        conn: &Connection,
        qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
        self.draw(conn, qh);
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {}

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {}

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {}
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }
    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}
    fn update_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}
    fn output_destroyed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: wl_output::WlOutput) {}
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if self.data_device.is_none() {
            if let Some(manager) = &self.data_device_manager {
                self.data_device = Some(manager.get_data_device(qh, &seat));
            }
        }

        match capability {
            Capability::Keyboard => {
                if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                    log::warn!("Failed to get keyboard: {}", e);
                }
            }
            Capability::Pointer if !self.config.general.ignore_mouse => {
                if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                    log::warn!("Failed to get pointer: {}", e);
                }
            }
            _ => {}
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _: &QueueHandle<Self>,
        _: wl_seat::WlSeat,
        _capability: Capability,
    ) {}

    fn remove_seat(&mut self, _: &Connection, _: &QueueHandle<Self>, _: wl_seat::WlSeat) {}
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_keyboard::WlKeyboard,
        _: &wl_surface::WlSurface,
        _: u32,
        _: &[u32],
        _: &[xkb::Keysym],
    ) {
        self.launcher.ready();
    }

    fn leave(
        &mut self,
        _: &Connection,
        qh: &QueueHandle<Self>,
        _: &wl_keyboard::WlKeyboard,
        _: &wl_surface::WlSurface,
        _: u32,
    ) {
        // Focus moves to the drop target while dragging.
        if self.launcher.activator().is_dragging() {
            return;
        }
        self.launcher.hide(&mut self.view);
        self.flush(qh);
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        let raw_sym = u32::from(event.keysym);

        match raw_sym {
            keysyms::KEY_Escape => self.launcher.hide(&mut self.view),
            keysyms::KEY_Return | keysyms::KEY_KP_Enter => {
                self.trigger(Trigger::Activate { keep_open: self.ctrl });
            }
            keysyms::KEY_Up => self.launcher.move_selection(-1, &mut self.view),
            keysyms::KEY_Down => self.launcher.move_selection(1, &mut self.view),
            keysyms::KEY_BackSpace => {
                if self.view.query.pop().is_some() {
                    self.search();
                }
            }
            _ if self.ctrl => {
                // Latin-1 keysyms equal their code point.
                if let Some(c) = char::from_u32(raw_sym).filter(|c| c.is_ascii_graphic()) {
                    self.trigger(Trigger::QuickKey(c.to_string()));
                }
            }
            _ => {
                if let Some(utf8) = event.utf8 {
                    if !utf8.chars().any(|c| c.is_control()) {
                        self.view.query.push_str(&utf8);
                        self.search();
                    }
                }
            }
        }

        self.flush(qh);
    }

    fn release_key(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_keyboard::WlKeyboard,
        _: u32,
        _: KeyEvent,
    ) {}

    fn update_modifiers(
        &mut self,
        _: &Connection,
        qh: &QueueHandle<Self>,
        _: &wl_keyboard::WlKeyboard,
        _serial: u32,
        modifiers: Modifiers,
        _layout: u32,
    ) {
        if self.ctrl == modifiers.ctrl {
            return;
        }
        self.ctrl = modifiers.ctrl;
        self.launcher.set_quick_mode(modifiers.ctrl, &mut self.view);
        let quick_mode = self.launcher.list().quick_mode();
        if self.view.quick_mode != quick_mode {
            self.view.quick_mode = quick_mode;
            self.view.mark_dirty();
        }
        self.flush(qh);
    }
}

impl PointerHandler for WaylandApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            let (x, y) = event.position;
            match event.kind {
                PointerEventKind::Enter { .. } | PointerEventKind::Motion { .. } => {
                    if let Some(press) = self.press.take() {
                        let moved = (x - press.x).hypot(y - press.y);
                        if moved > DRAG_THRESHOLD && self.drag.is_none() {
                            self.start_drag(qh, &press);
                        } else {
                            self.press = Some(press);
                        }
                    }
                    if self.drag.is_none() {
                        if let Some(index) = self.row_at(x, y) {
                            self.launcher.hover(index, &mut self.view);
                        }
                    }
                }
                PointerEventKind::Leave { .. } => {
                    self.press = None;
                }
                PointerEventKind::Press { button, serial, .. } if button == BTN_LEFT => {
                    self.drag = None;
                    self.launcher.press_started();
                    self.press = self.row_at(x, y).map(|index| Press { index, x, y, serial });
                }
                PointerEventKind::Release { button, .. } if button == BTN_LEFT => {
                    let pressed = self.press.take();
                    let released = self.row_at(x, y);
                    match pressed {
                        Some(press) if Some(press.index) == released => {
                            self.trigger(Trigger::Click { index: press.index, keep_open: self.ctrl });
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        self.flush(qh);
    }
}

impl DataDeviceHandler for WaylandApp {
    fn enter(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataDevice, _x: f64, _y: f64, _: &wl_surface::WlSurface) {}

    fn leave(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataDevice) {}

    fn motion(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataDevice, _x: f64, _y: f64) {}

    fn selection(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataDevice) {}

    fn drop_performed(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataDevice) {}
}

impl DataOfferHandler for WaylandApp {
    fn source_actions(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &mut DragOffer, _: DndAction) {}

    fn selected_action(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &mut DragOffer, _: DndAction) {}
}

impl DataSourceHandler for WaylandApp {
    fn accept_mime(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataSource, _mime: Option<String>) {}

    fn send_request(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &WlDataSource,
        mime: String,
        mut fd: WritePipe,
    ) {
        let Some(drag) = &self.drag else {
            return;
        };
        if mime != drag.payload.mime {
            log::debug!("Drop target asked for unsupported type '{}'", mime);
            return;
        }
        if let Err(e) = fd.write_all(drag.payload.data.as_bytes()) {
            log::warn!("Failed to send drag data: {}", e);
        }
    }

    fn cancelled(&mut self, _: &Connection, qh: &QueueHandle<Self>, _: &WlDataSource) {
        self.end_drag();
        self.flush(qh);
    }

    fn dnd_dropped(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataSource) {}

    fn dnd_finished(&mut self, _: &Connection, qh: &QueueHandle<Self>, _: &WlDataSource) {
        self.end_drag();
        self.flush(qh);
    }

    fn action(&mut self, _: &Connection, _: &QueueHandle<Self>, _: &WlDataSource, _: DndAction) {}
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_pointer!(WaylandApp);
delegate_data_device!(WaylandApp);
delegate_layer!(WaylandApp);
delegate_registry!(WaylandApp);

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    fn runtime_add_global(&mut self, _: &Connection, _: &QueueHandle<Self>, _: u32, _: &str, _: u32) {}

    fn runtime_remove_global(&mut self, _: &Connection, _: &QueueHandle<Self>, _: u32, _: &str) {}
}
