mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Result;
use calloop::EventLoop;
use calloop_wayland_source::WaylandSource;
use clap::Parser;
use smithay_client_toolkit::{
    shell::wlr_layer::{Anchor, KeyboardInteractivity, Layer},
    shell::WaylandSurface,
};
use wayland_client::{globals::registry_queue_init, Connection};
use quickrun::config::{load_config, APP_NAME};
use quickrun::executor::Spawner;
use quickrun::history::default_history_path;
use quickrun::orchestrator::Reply;
use quickrun::{Launcher, Registry};
use crate::ui::icons::{IconCache, IconReply};
use crate::ui::render::Renderer;
use crate::ui::wayland::WaylandApp;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only query this module
    #[arg(short, long)]
    module: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // 1. Config & modules
    let config = load_config(args.config.as_deref())?;
    let registry = Arc::new(Registry::from_config(&config));
    if registry.is_empty() {
        log::warn!("No modules enabled, nothing will match");
    }

    let pin = match args.module {
        Some(name) if registry.slot_of(&name).is_none() => {
            log::warn!("Unknown module '{}', querying all modules", name);
            None
        }
        other => other,
    };

    let launcher = Launcher::new(&config, Arc::clone(&registry), Spawner::new(default_history_path()));

    // 2. Wayland connection & event loop
    let mut event_loop: EventLoop<WaylandApp> = EventLoop::try_new()?;
    let conn = Connection::connect_to_env()?;
    let (globals, event_queue) = registry_queue_init::<WaylandApp>(&conn)?;
    let qh = event_queue.handle();

    let (tx_icons, rx_icons) = calloop::channel::channel::<IconReply>();
    let (tx_replies, rx_replies) = calloop::channel::channel::<Reply>();
    let renderer = Renderer::new(IconCache::new(tx_icons), config.general.placeholder.clone());

    let mut app = WaylandApp::new(&globals, &qh, config, launcher, renderer, tx_replies)?;

    // 3. Layer surface
    let surface = app.compositor_state.create_surface(&qh);
    let layer_surface = app.layer_shell_state.create_layer_surface(
        &qh,
        surface,
        Layer::Overlay,
        Some(APP_NAME),
        None,
    );
    layer_surface.set_anchor(Anchor::empty());
    layer_surface.set_size(app.config.theme.width, app.config.theme.height);
    layer_surface.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
    layer_surface.commit();
    app.layer_surface = Some(layer_surface);

    app.launcher.show(pin, &mut app.view);

    // 4. Event sources
    let handle = event_loop.handle();
    let qh_icons = qh.clone();
    handle
        .insert_source(rx_icons, move |event, _, app: &mut WaylandApp| {
            if let calloop::channel::Event::Msg((key, pixmap)) = event {
                app.renderer.insert_icon(key, pixmap);
                app.view.mark_dirty();
                app.flush(&qh_icons);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to watch icon channel: {}", e.error))?;

    let qh_replies = qh.clone();
    handle
        .insert_source(rx_replies, move |event, _, app: &mut WaylandApp| {
            if let calloop::channel::Event::Msg(reply) = event {
                app.on_reply(reply);
                app.flush(&qh_replies);
            }
        })
        .map_err(|e| anyhow::anyhow!("failed to watch reply channel: {}", e.error))?;

    handle
        .insert_source(WaylandSource::new(conn.clone(), event_queue), |_, queue, app| {
            queue.dispatch_pending(app)
        })
        .map_err(|e| anyhow::anyhow!("failed to watch wayland socket: {}", e.error))?;

    // 5. Run until the session is hidden
    while !app.should_exit {
        event_loop.dispatch(None, &mut app)?;
        if let Some(fault) = app.view.take_fault() {
            return Err(fault.into());
        }
    }

    Ok(())
}
