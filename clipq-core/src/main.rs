//! src/main.rs
//! Headless clipboard queue console
//!
//! Drives the queue engine from stdin against a simulated foreground
//! application: `select` stages text, `copy` is an ordinary copy, `qcopy`
//! a queued copy, and pastes are recorded in the transcript.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::{
    signal,
    sync::mpsc::{self, UnboundedSender},
};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use clipq::{HistoryLog, HistoryStore, PinMode};
use clipq_core::{
    Logger,
    config::Config,
    controller::{
        Action, EventLoop, QueueController, TaskResult,
        queue_controller::Collaborators,
        report_error,
    },
    platform::{
        AlwaysGranted, ClipboardEffector, LogPresentation, SharedClipboard, SimulatedEffector,
    },
};

/// One parsed console line.
#[derive(Debug)]
enum ConsoleInput {
    Action(Action),
    Select(String),
    Copy,
    Pastes,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = Config::load().await.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e:#}");
        Config::default()
    });

    let _log_guard = Logger::init(&config.logging).context("Failed to initialize logging")?;
    info!("Starting clipq console");

    config
        .queue
        .validate()
        .context("Invalid queue configuration")?;

    let (task_tx, task_rx) = mpsc::unbounded_channel::<TaskResult>();
    let (action_tx, action_rx) = mpsc::unbounded_channel::<Action>();

    let clipboard = SharedClipboard::new();
    let effector = Arc::new(
        SimulatedEffector::new(clipboard.clone()).with_capture_sink(action_tx.clone()),
    );

    let mut controller = QueueController::new(
        HistoryLog::new(),
        config.queue.clone(),
        Collaborators {
            mirror: Arc::new(clipboard.clone()),
            effector: effector.clone(),
            permission: Arc::new(AlwaysGranted),
            presentation: Arc::new(LogPresentation),
        },
        task_tx,
    );
    let mut event_loop = EventLoop::new(task_rx, action_rx);

    spawn_console(action_tx.clone(), effector.clone());
    spawn_shutdown_handler(action_tx);

    println!("clipq ready, type `help` for commands");

    while let Some(action) = event_loop.next_action().await {
        match action {
            Action::Quit => break,
            Action::Status => println!("{}", controller.snapshot()),
            Action::History => print_history(&controller),
            action => {
                if let Err(e) = controller.dispatch(action) {
                    report_error(&e);
                    println!("error: {e}");
                }
            }
        }
    }

    let pasted = effector.pasted_texts();
    info!(
        events = event_loop.event_count(),
        pastes = pasted.len(),
        "clipq console exited cleanly"
    );
    Ok(())
}

fn spawn_console(action_tx: UnboundedSender<Action>, effector: Arc<SimulatedEffector>) {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(
            tokio::io::stdin(),
            LinesCodec::new_with_max_length(64 * 1024),
        );

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read console input: {e}");
                    break;
                }
            };

            let input = match parse_command(&line) {
                Ok(Some(input)) => input,
                Ok(None) => continue,
                Err(message) => {
                    println!("{message}");
                    continue;
                }
            };

            match input {
                ConsoleInput::Select(text) => effector.select(text),
                ConsoleInput::Copy => {
                    let effector = Arc::clone(&effector);
                    tokio::spawn(async move {
                        if let Err(e) = effector.invoke_copy().await {
                            println!("copy failed: {e}");
                        }
                    });
                }
                ConsoleInput::Pastes => {
                    for (i, text) in effector.pasted_texts().iter().enumerate() {
                        println!("{i:>3}  {text}");
                    }
                }
                ConsoleInput::Action(action) => {
                    if action_tx.send(action).is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Console input closed");
        let _ = action_tx.send(Action::Quit);
    });
}

fn spawn_shutdown_handler(action_tx: UnboundedSender<Action>) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = action_tx.send(Action::Quit);
        }
    });
}

fn print_history(controller: &QueueController) {
    let head = controller.cursor().head_index();
    let highlighted = controller.highlighted();

    for (i, item) in controller.history().all().iter().enumerate() {
        let queued = head.is_some_and(|h| i <= h);
        let marker = match (Some(i) == head, queued, Some(i) == highlighted) {
            (true, _, _) => '>',
            (_, true, _) => '*',
            (_, _, true) => '~',
            _ => ' ',
        };
        println!("{marker} {i:>3}  {}  (x{})", item.title, item.copy_count);
    }
}

fn parse_index(arg: Option<&str>, command: &str) -> Result<usize, String> {
    arg.ok_or_else(|| format!("usage: {command} <index>"))?
        .parse()
        .map_err(|_| format!("{command}: not a number"))
}

fn parse_command(line: &str) -> Result<Option<ConsoleInput>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, Some(rest.trim())),
        None => (line, None),
    };

    let action = match command {
        "select" => {
            let text = rest.filter(|t| !t.is_empty()).ok_or("usage: select <text>")?;
            return Ok(Some(ConsoleInput::Select(text.to_string())));
        }
        "copy" => return Ok(Some(ConsoleInput::Copy)),
        "pastes" => return Ok(Some(ConsoleInput::Pastes)),
        "help" => {
            println!("{HELP}");
            return Ok(None);
        }
        "qcopy" => Action::QueuedCopy,
        "start" => Action::StartQueueMode,
        "paste" => match rest {
            None => Action::QueuedPaste,
            Some(_) => Action::QueuedPasteMultiple(parse_index(rest, "paste")?),
        },
        "abort" => Action::CancelBulkPaste,
        "cancel" => Action::CancelQueueMode,
        "undo" => Action::UndoLastCopy,
        "delete" => Action::DeleteHistoryItem(parse_index(rest, "delete")?),
        "delete-highlighted" => Action::DeleteHighlightedItem,
        "highlight" => match rest {
            Some("none") => Action::Highlight(None),
            _ => Action::Highlight(Some(parse_index(rest, "highlight")?)),
        },
        "head" => Action::JumpTo(parse_index(rest, "head")?),
        "mode" => match rest {
            Some("latest") => Action::SetPinMode(PinMode::Latest),
            Some("next") => Action::SetPinMode(PinMode::Next),
            _ => return Err("usage: mode latest|next".to_string()),
        },
        "clear" => Action::ClearHistory,
        "status" => Action::Status,
        "history" => Action::History,
        "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command `{other}`, try `help`")),
    };

    Ok(Some(ConsoleInput::Action(action)))
}

const HELP: &str = "\
select <text>        stage text in the simulated application
copy                 ordinary copy of the selection
qcopy                queued copy of the selection
start                start queue mode
paste [n]            paste the head of the queue, or the next n items
abort                stop a running bulk paste
cancel               leave queue mode
undo                 drop the newest copy
delete <i>           delete history entry i
highlight <i>|none   move the highlight
delete-highlighted   delete the highlighted entry
head <i>             queue everything from entry i to the newest
mode latest|next     clipboard pinning policy
clear                clear the history
status | history | pastes | quit";
