//! Headless desktop shell: mounts the join screen against the real token
//! service and room server, and prints every view change as text.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use liveroom_core::{
    ConnectionController, LiveKitTransport, NoopAudioSession, RegistrationClient, ScreenConfig,
    ScreenEvent, ScreenEventListener, ScreenView, StartupMode, Tile,
};
use tokio::sync::mpsc::{self, UnboundedSender};

#[derive(Parser)]
#[command(name = "liveroom")]
#[command(about = "Join a live room and print the participant grid")]
struct Args {
    /// JSON config file
    #[arg(short, long, default_value = "liveroom.json")]
    config: PathBuf,

    /// Join with this username instead of a generated one
    #[arg(short, long)]
    username: Option<String>,

    /// Device width in points
    #[arg(short, long)]
    width: Option<f32>,

    /// Turn the camera off once joined
    #[arg(long)]
    no_camera: bool,

    /// Mute the microphone once joined
    #[arg(long)]
    mute: bool,
}

/// Forwards core events to the main loop.
struct ChannelListener {
    tx: UnboundedSender<ScreenEvent>,
}

impl ScreenEventListener for ChannelListener {
    fn on_event(&self, event: ScreenEvent) {
        let _ = self.tx.send(event);
    }
}

type Controller = ConnectionController<RegistrationClient, NoopAudioSession, LiveKitTransport>;

fn render(view: &ScreenView) -> String {
    match view {
        ScreenView::LoginForm { username, error } => {
            let mut out = format!("[login] username: {username}");
            if let Some(error) = error {
                out.push_str(&format!("\n[login] error: {error}"));
            }
            out
        }
        ScreenView::Loading => "[loading] connecting...".to_string(),
        ScreenView::Room(room) => {
            let mut out = format!(
                "[room] {} | clip {} ({}px)\n[room] {}",
                room.title,
                room.clip.embed_url(),
                room.clip.height,
                room.participant_count
            );
            for row in room.grid.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|tile| match tile {
                        Tile::Video { label, speaking, .. } => {
                            format!("{label}{}", if *speaking { " *" } else { "" })
                        }
                        Tile::Placeholder { label, subtext, .. } => format!("{label} ({subtext})"),
                    })
                    .collect();
                out.push_str(&format!("\n  | {} |", cells.join(" | ")));
            }
            out
        }
    }
}

async fn apply_media_toggles(controller: &Controller, args: &Args) {
    if args.no_camera {
        if let Err(e) = controller.set_camera_enabled(false).await {
            tracing::warn!("could not turn camera off: {e}");
        }
    }
    if args.mute {
        if let Err(e) = controller.set_microphone_enabled(false).await {
            tracing::warn!("could not mute microphone: {e}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    liveroom_core::init_logging();
    let args = Args::parse();

    let mut config = ScreenConfig::load(&args.config)?;
    if let Some(width) = args.width {
        config.screen_width = width;
    }
    if args.username.is_some() {
        config.startup_mode = StartupMode::ManualEntry;
    }

    let registrar =
        RegistrationClient::new(&config.registration_url, config.registration_timeout())?;
    let controller = ConnectionController::new(
        config,
        registrar,
        NoopAudioSession,
        LiveKitTransport::new(),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.add_listener(Arc::new(ChannelListener { tx }));
    controller.mount();

    match controller.config().startup_mode {
        StartupMode::AutoStart => {}
        StartupMode::Prefilled => controller.submit()?,
        StartupMode::ManualEntry => {
            let Some(username) = args.username.clone() else {
                return Err("manual_entry startup mode needs --username".into());
            };
            controller.set_username(username)?;
            controller.submit()?;
        }
    }

    let mut toggles_applied = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, leaving room");
                break;
            }
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let ScreenEvent::GridChanged(_) = &event {
                    if !toggles_applied && controller.phase().is_joined() {
                        toggles_applied = true;
                        apply_media_toggles(&controller, &args).await;
                    }
                }
                println!("{}", render(&controller.view()));
            }
        }
    }

    controller.unmount().await;
    Ok(())
}
