use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use clap::Parser;
use console::Term;
use z_duel_tetris::config::SYNC_INTERVAL;
use z_duel_tetris::{
    Action, AnsiTermStyle, DuelScreen, FallResult, FallTimer, Input, PanelState, PlayerPanel,
    Snapshot, TermRender, Tetris, map_key,
};
use zenoh::key_expr::KeyExpr;
use zenoh_duel::{
    DuelNode, FileIdentityStore, PeerId, SessionExt, StepResult, initialize_identity,
};

/// z_duel_tetris - two-player falling blocks over Zenoh
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File keeping the peer id between runs
    #[arg(short, long, default_value = ".tetris-peer.json")]
    identity: PathBuf,

    /// Peer id to connect to at startup
    #[arg(long)]
    connect: Option<PeerId>,

    /// Key expression prefix
    #[arg(short, long)]
    prefix: Option<KeyExpr<'static>>,

    /// Path to Zenoh config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

// Keeps the screen in sync with the game and the link
struct Ui {
    term: Term,
    // Last thing worth telling the player
    notice: String,
}

impl Ui {
    fn render(&self, engine: &Tetris, node: &DuelNode<Snapshot>) -> anyhow::Result<()> {
        let local = engine.view();
        let opponent = PanelState::from(node.opponent());

        let mut status = vec![
            format!("You: {}  ({})", node.id(), node.status()),
            node.directory().status_line(),
        ];
        if node.is_connected() {
            status.push(format!("Link: {}", node.stats()));
        } else {
            for (n, peer) in node.directory().peer_ids().iter().take(9).enumerate() {
                status.push(format!("  {}. {}", n + 1, peer));
            }
        }
        status.push(self.notice.clone());
        status.push(
            "←/a →/d move  ↑/w rotate  ↓/s drop  space hard drop  p pause  r restart  1-9 connect  q quit"
                .to_string(),
        );

        let screen = DuelScreen::new(
            PlayerPanel::new("You", &local),
            PlayerPanel::new("Opponent", &opponent).waiting(!node.is_connected()),
            status,
        );
        self.term.move_cursor_to(0, 0)?;
        for line in screen.render(&AnsiTermStyle) {
            self.term.write_line(&line)?;
        }
        self.term.clear_to_end_of_screen()?;
        self.term.flush()?;
        Ok(())
    }
}

fn init_tracing(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            // The game owns stdout; keep stderr quiet
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

// Restart locally and tell the opponent
async fn restart_match(engine: &mut Tetris, node: &DuelNode<Snapshot>) {
    engine.restart();
    if node.is_connected() {
        if let Err(e) = node.send_restart().await {
            tracing::warn!("Failed to send restart: {}", e);
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 1)]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_ref())?;

    let mut store = FileIdentityStore::new(&args.identity);
    let peer_id = initialize_identity(&mut store)
        .with_context(|| format!("Failed to load identity from {}", args.identity.display()))?;

    let zenoh_config = match &args.config {
        Some(path) => zenoh::Config::from_file(path)
            .map_err(|e| anyhow!("Failed to load config file: {}", e))?,
        None => zenoh::Config::default(),
    };
    let session = zenoh::open(zenoh_config)
        .await
        .map_err(|e| anyhow!("Failed to open zenoh session: {}", e))?;

    let mut node_builder = session.declare_duel_node::<Snapshot>().peer_id(peer_id);
    if let Some(prefix) = args.prefix.clone() {
        node_builder = node_builder.prefix(prefix);
    }
    let mut node = node_builder.await.context("Failed to declare duel node")?;
    tracing::info!("Peer id: {}", node.id());

    if let Some(remote) = &args.connect {
        node.connect_to(remote)
            .with_context(|| format!("Failed to connect to {}", remote))?;
    }

    // Keyboard reading blocks, so it gets its own thread
    let (key_tx, key_rx) = flume::unbounded::<Input>();
    std::thread::spawn(move || {
        let input_term = Term::stdout();
        loop {
            let key = match input_term.read_key() {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!("Keyboard read failed: {}", e);
                    break;
                }
            };
            let Some(input) = map_key(&key) else {
                continue;
            };
            if key_tx.send(input).is_err() || input == Input::Quit {
                break;
            }
        }
    });

    let mut ui = Ui {
        term: Term::stdout(),
        notice: String::new(),
    };
    ui.term.hide_cursor()?;
    ui.term.clear_screen()?;

    let mut engine = Tetris::new();
    engine.start();
    let mut fall_timer = FallTimer::new();
    fall_timer.sync(engine.fall_schedule());
    let mut sync = tokio::time::interval(SYNC_INTERVAL);
    sync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut opponent_over = false;

    loop {
        tokio::select! {
            _ = fall_timer.tick() => {
                if let FallResult::Locked(report) = engine.move_down() {
                    if report.lines_cleared > 0 {
                        tracing::debug!("Cleared {} line(s), +{}", report.lines_cleared, report.score_gained);
                    }
                    if report.game_over {
                        tracing::info!("Game over with score {}", engine.score());
                    }
                }
            }
            _ = sync.tick() => {
                if node.is_connected() {
                    if let Err(e) = node.push_snapshot(&engine.get_state()).await {
                        tracing::warn!("Failed to push snapshot: {}", e);
                    }
                }
            }
            input = key_rx.recv_async() => {
                match input {
                    Ok(Input::Quit) | Err(_) => break,
                    Ok(Input::Game(action)) => {
                        engine.perform(action);
                        if action == Action::Pause {
                            tracing::debug!("Paused: {}", engine.is_paused());
                        }
                    }
                    Ok(Input::DropOrRestart) => {
                        if engine.is_active() {
                            engine.hard_drop();
                        } else {
                            restart_match(&mut engine, &node).await;
                        }
                    }
                    Ok(Input::Restart) => restart_match(&mut engine, &node).await,
                    Ok(Input::SelectPeer(index)) => {
                        match node.directory().peer_ids().get(index).cloned() {
                            Some(remote) => {
                                if let Err(e) = node.connect_to(&remote) {
                                    ui.notice = format!("Cannot connect to {}: {}", remote, e);
                                } else {
                                    ui.notice = format!("Connecting to {}...", remote);
                                }
                            }
                            None => ui.notice = format!("No peer #{}", index + 1),
                        }
                    }
                }
            }
            event = node.next_event() => {
                match node.handle(event).await.context("Duel node failed")? {
                    StepResult::Stop => break,
                    StepResult::Connected { remote, role } => {
                        ui.notice = format!("Playing against {} as {}", remote, role);
                        opponent_over = false;
                        engine.restart();
                    }
                    StepResult::ConnectFailed { remote, reason } => {
                        ui.notice = format!("Connection to {} failed: {}", remote, reason);
                    }
                    StepResult::Disconnected { remote } => {
                        ui.notice = format!("{} disconnected", remote);
                    }
                    StepResult::Restart => {
                        ui.notice = "Opponent restarted the match".to_string();
                        opponent_over = false;
                        engine.restart();
                    }
                    StepResult::OpponentUpdated => {
                        let over = node.opponent().game_over;
                        if over && !opponent_over && engine.is_active() {
                            tracing::info!("Opponent game over");
                            ui.notice = "Opponent is out!".to_string();
                        }
                        opponent_over = over;
                    }
                    StepResult::PeersChanged | StepResult::Handled | StepResult::Timeout => {}
                }
            }
        }
        fall_timer.sync(engine.fall_schedule());
        ui.render(&engine, &node)?;
    }

    fall_timer.stop();
    drop(node);
    ui.term.show_cursor()?;
    session
        .close()
        .await
        .map_err(|e| anyhow!("Failed to close zenoh session: {}", e))?;
    Ok(())
}
