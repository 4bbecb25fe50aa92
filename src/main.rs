use listpanel::modules::client::HttpListApi;
use listpanel::modules::command::{Command, Outcome};
use listpanel::modules::config::{load_config, save_config};
use listpanel::modules::session::{Action, Controllers, Session};
use listpanel::modules::types::{ListId, ViewKind};
use std::error::Error;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use simplelog::*;
use log::{info, warn};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "listpanel",
    version,
    about = "Blocklist and allowlist manager",
    long_about = include_str!("../help.txt")
)]
struct Cli {
    #[arg(short = 'l', long = "log-file", default_value = "listpanel.log")]
    log_file: String,

    #[arg(short = 'c', long = "config", default_value = "./listpanel.toml")]
    config: String,

    #[arg(short = 'u', long = "base-url", help = "Overrides base_url from the config file")]
    base_url: Option<String>,

    #[arg(short = 'v', long = "view", default_value = "blocklist")]
    view: ViewKind,

    #[arg(long = "init-config", help = "Write the effective configuration to --config and exit")]
    init_config: bool,
}

enum Event {
    Line(String),
    Done(Outcome),
    Closed,
}

impl From<Outcome> for Event {
    fn from(outcome: Outcome) -> Self {
        Event::Done(outcome)
    }
}

enum Flow {
    Continue(Vec<Command>),
    Quit,
}

fn init_logger(log_path: &str) -> Result<(), Box<dyn Error>> {
    WriteLogger::init(
        LevelFilter::Info,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .build(),
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?,
    )?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_file)?;

    let mut config = load_config(&cli.config)?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if cli.init_config {
        save_config(&cli.config, &config)?;
        println!("Wrote {}", cli.config);
        return Ok(());
    }

    let api = HttpListApi::new(&config.base_url, config.timeout(), &config.user_agent)?;
    info!("Managing lists at {}", api.base());
    let controllers = Controllers::with_state_file(&config.state_file);
    let mut session = Session::new(Arc::new(api), controllers, config.download_dir.clone());

    let (tx, rx) = mpsc::channel::<Event>();
    spawn_stdin_reader(tx.clone());

    let mut view = cli.view;
    println!("Connected to {}, type `help` for commands", config.base_url);
    let initial = session.act(view, Action::Load);
    dispatch(&session, initial, &tx);

    for event in rx {
        match event {
            Event::Line(line) => match handle_line(&mut session, &mut view, &line) {
                Flow::Continue(commands) => dispatch(&session, commands, &tx),
                Flow::Quit => break,
            },
            Event::Done(outcome) => {
                let origin = outcome.origin;
                let follow = session.complete(outcome);
                dispatch(&session, follow, &tx);
                if origin == view {
                    print_view(&session, view);
                }
            }
            Event::Closed => break,
        }
    }

    info!("Exiting");
    Ok(())
}

fn spawn_stdin_reader(tx: Sender<Event>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::Closed);
    });
}

fn dispatch(session: &Session, commands: Vec<Command>, tx: &Sender<Event>) {
    for command in commands {
        session.spawn(command, tx.clone());
    }
}

fn handle_line(session: &mut Session, view: &mut ViewKind, line: &str) -> Flow {
    let line = line.trim();
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let commands = match verb {
        "" => Vec::new(),
        "quit" | "exit" => return Flow::Quit,
        "help" => {
            println!("{}", include_str!("../help.txt"));
            Vec::new()
        }
        "show" => {
            print_view(session, *view);
            Vec::new()
        }
        "view" => match rest.parse::<ViewKind>() {
            Ok(next) => {
                *view = next;
                session.act(next, Action::Load)
            }
            Err(e) => {
                println!("{e}");
                Vec::new()
            }
        },
        "add" => {
            let (list, domain) = target(*view, rest);
            session.document_mut().set_value(&list.input_id(), domain);
            session.act(*view, Action::Add(list))
        }
        "rm" | "remove" => {
            let (list, domain) = target(*view, rest);
            let bound = session
                .document()
                .remove_control(&list.items_id(), domain)
                .map(str::to_string);
            match bound {
                Some(item) => session.act(*view, Action::Remove(list, item)),
                None => {
                    println!("{domain} is not on the current {list} page");
                    Vec::new()
                }
            }
        }
        "search" => match *view {
            ViewKind::List(list) => {
                session.document_mut().set_value(&list.search_id(), rest);
                session.act(*view, Action::KeyPress(list, "Enter".to_string()))
            }
            ViewKind::Global => {
                println!("search works in the blocklist and allowlist views");
                Vec::new()
            }
        },
        "page" => match rest.parse::<u32>() {
            Ok(page) => {
                let commands = session.act(*view, Action::Page(page));
                if commands.is_empty() {
                    println!("page {page} is not available");
                }
                commands
            }
            Err(_) => {
                println!("usage: page <number>");
                Vec::new()
            }
        },
        "upload" => {
            let (list, path) = target(*view, rest);
            if path.is_empty() {
                println!("usage: upload [list] <file>");
                Vec::new()
            } else {
                session
                    .document_mut()
                    .select_file(&list.upload_id(), Some(Path::new(path)));
                session.act(*view, Action::Upload(list))
            }
        }
        "download" => {
            let (list, _) = target(*view, rest);
            session.act(*view, Action::Download(list))
        }
        other => {
            warn!("Unknown command {other}");
            println!("unknown command `{other}`, try `help`");
            Vec::new()
        }
    };
    Flow::Continue(commands)
}

/// Splits an optional leading list name off `rest`. Without one, list views
/// act on their own list and the global view on the blocklist.
fn target(view: ViewKind, rest: &str) -> (ListId, &str) {
    let (head, tail) = rest.split_once(' ').unwrap_or((rest, ""));
    if let Ok(list) = head.parse::<ListId>() {
        return (list, tail.trim());
    }
    match view {
        ViewKind::List(list) => (list, rest),
        ViewKind::Global => (ListId::Blocklist, rest),
    }
}

fn print_view(session: &Session, view: ViewKind) {
    let doc = session.document();
    let mut out = String::new();
    match view {
        ViewKind::List(list) => out.push_str(&doc.outline(list, &list.pagination_id())),
        ViewKind::Global => {
            // One pagination bar, shown under the last list.
            out.push_str(&doc.outline(ListId::Blocklist, ""));
            out.push_str(&doc.outline(ListId::Allowlist, &view.pagination_id()));
        }
    }
    print!("{out}> ");
    let _ = io::stdout().flush();
}
