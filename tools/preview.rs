/// Preview — interactive shell for playing through a catalog.
///
/// Usage: preview <catalog.ron | catalog_dir> [--width <n>] [--seed <n>]
///
/// Commands:
///   puzzles <n>                  — report n completed puzzles
///   books <discovered> <read>    — report book counts
///   flag <name>                  — raise a story flag
///   group <name> <items> <done>  — report group progress (comma lists)
///   walk <n>                     — report puzzles 1..=n, talking after each
///   talk                         — start a conversation at the current beat
///   next                         — continue the active playback
///   page                         — show the next page of the current line
///   abort                        — abort the active playback
///   status                       — show beat, pending events, and ledger
///   seed <n>                     — rebuild the engine with a new seed
///   help                         — list commands
///   quit                         — exit

use std::io::{self, BufRead, Write};

use storybeat_engine::core::config::DEFAULT_PAGE_WIDTH;
use storybeat_engine::core::engine::{Conversation, EngineNotification, NarrativeEngine};
use storybeat_engine::core::playback::{DialogueEntry, PlaybackStep};
use storybeat_engine::schema::metrics::GameMetricsSnapshot;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let content_path = args[1].clone();
    let mut width = DEFAULT_PAGE_WIDTH;
    let mut seed: u64 = 42;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--width" if i + 1 < args.len() => {
                i += 1;
                width = args[i].parse().unwrap_or(DEFAULT_PAGE_WIDTH);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut engine = match build_engine(&content_path, width, seed) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} events across {} beats",
        engine.catalog().events().len(),
        engine.catalog().beats().len()
    );
    println!("Seed: {}  Width: {}", seed, width);
    println!("Type 'help' for commands.\n");

    let mut snapshot = GameMetricsSnapshot::new(engine.current_beat().clone());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview [{}]> ", engine.current_beat());
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "puzzles" => match parts.get(1).and_then(|s| s.parse().ok()) {
                Some(n) => {
                    snapshot.completed_puzzles = n;
                    submit(&mut engine, &mut snapshot);
                }
                None => println!("Usage: puzzles <n>"),
            },
            "books" => {
                let counts: Option<(u32, u32)> = parts
                    .get(1)
                    .and_then(|s| s.parse().ok())
                    .zip(parts.get(2).and_then(|s| s.parse().ok()));
                match counts {
                    Some((discovered, read)) => {
                        snapshot.discovered_books = discovered;
                        snapshot.completed_books = read;
                        submit(&mut engine, &mut snapshot);
                    }
                    None => println!("Usage: books <discovered> <read>"),
                }
            }
            "flag" => match parts.get(1) {
                Some(name) => {
                    snapshot.flags.insert(name.to_string());
                    submit(&mut engine, &mut snapshot);
                }
                None => println!("Usage: flag <name>"),
            },
            "group" => {
                if parts.len() < 4 {
                    println!("Usage: group <name> <item1,item2,...> <done1,done2,...>");
                    continue;
                }
                let items: Vec<&str> = split_list(parts[2]);
                let done: Vec<&str> = split_list(parts[3]);
                snapshot = snapshot.with_group(parts[1], &items, &done);
                submit(&mut engine, &mut snapshot);
            }
            "walk" => {
                let count: u32 = match parts.get(1).and_then(|s| s.parse().ok()) {
                    Some(n) if n > 0 => n,
                    _ => {
                        println!("Usage: walk <n>");
                        continue;
                    }
                };
                for puzzles in 1..=count {
                    println!("\n--- {} puzzles ---", puzzles);
                    snapshot.completed_puzzles = puzzles;
                    submit(&mut engine, &mut snapshot);
                    talk(&mut engine);
                    while engine.playback().is_active() {
                        if !step(&mut engine) {
                            break;
                        }
                    }
                }
            }
            "talk" => talk(&mut engine),
            "next" | "n" => {
                step(&mut engine);
            }
            "page" | "p" => match engine.next_page() {
                Some(entry) => print_page(entry),
                None => println!("No more pages."),
            },
            "abort" => {
                if engine.abort() {
                    println!("Playback aborted.");
                } else {
                    println!("Nothing is playing.");
                }
            }
            "status" => print_status(&engine),
            "seed" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(s) => match build_engine(&content_path, width, s) {
                    Ok(fresh) => {
                        engine = fresh;
                        snapshot = GameMetricsSnapshot::new(engine.current_beat().clone());
                        println!("Seed set to {}; progress reset.", s);
                    }
                    Err(e) => println!("ERROR: {}", e),
                },
                None => println!("Usage: seed <n>"),
            },
            _ => println!("Unknown command '{}'. Type 'help' for commands.", cmd),
        }
    }
}

fn build_engine(
    content_path: &str,
    width: usize,
    seed: u64,
) -> Result<NarrativeEngine, storybeat_engine::core::engine::EngineError> {
    let mut engine = NarrativeEngine::builder()
        .content_path(content_path)
        .page_width(width)
        .seed(seed)
        .build()?;
    engine.subscribe(|notification| match notification {
        EngineNotification::BeatChanged(t) => println!("  * beat: {} -> {}", t.from, t.to),
        EngineNotification::AvailabilityChanged(true) => println!("  * someone wants to talk"),
        EngineNotification::AvailabilityChanged(false) => {}
    });
    Ok(engine)
}

fn submit(engine: &mut NarrativeEngine, snapshot: &mut GameMetricsSnapshot) {
    snapshot.current_beat = engine.current_beat().clone();
    for report in engine.on_progress_updated(snapshot.clone()) {
        for id in &report.triggered {
            println!("  triggered: {}", id);
        }
    }
    snapshot.current_beat = engine.current_beat().clone();
}

fn talk(engine: &mut NarrativeEngine) {
    if engine.playback().is_active() {
        println!("A conversation is already playing; use 'next' or 'abort'.");
        return;
    }
    let beat = engine.current_beat().clone();
    match engine.start_conversation(&beat, &[]) {
        Conversation::Event(event) => {
            println!("\n=== {} ===", event.id);
            match engine.load(&event.id) {
                Ok(()) => {
                    step(engine);
                }
                Err(e) => println!("ERROR: {}", e),
            }
        }
        Conversation::Banter(line) => {
            let name = engine
                .catalog()
                .character(&line.character)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| line.character.to_string());
            println!("{}: {}", name, line.text);
        }
        Conversation::Nothing => println!("(nobody has anything to say)"),
    }
}

/// Returns false once the session has nothing more to show.
fn step(engine: &mut NarrativeEngine) -> bool {
    match engine.advance() {
        Ok(PlaybackStep::Entry(entry)) => {
            print_page(&entry);
            true
        }
        Ok(PlaybackStep::Completed(id)) => {
            println!("=== end of {} ===\n", id);
            false
        }
        Ok(PlaybackStep::Paused) => {
            println!("(paused)");
            false
        }
        Ok(PlaybackStep::Finished) => {
            println!("Nothing left to play.");
            false
        }
        Err(e) => {
            println!("ERROR: {}", e);
            false
        }
    }
}

fn print_page(entry: &DialogueEntry) {
    let more = if entry.has_more_pages() { " [more]" } else { "" };
    println!(
        "{} ({}/{}): {}{}",
        entry.character.name,
        entry.current_page_index + 1,
        entry.pages.len(),
        entry.current_page().trim_end(),
        more
    );
}

fn print_status(engine: &NarrativeEngine) {
    println!("Beat: {}", engine.current_beat());
    println!("Playback: {:?}", engine.playback_state());
    let pending: Vec<String> = engine.pending_events().iter().map(|id| id.to_string()).collect();
    println!("Pending: [{}]", pending.join(", "));
    let played: Vec<String> = engine.ledger().iter().map(|id| id.to_string()).collect();
    println!("Played: [{}]", played.join(", "));
}

fn split_list(input: &str) -> Vec<&str> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_usage() {
    println!("Usage: preview <catalog.ron | catalog_dir> [--width <n>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  puzzles <n>                  report n completed puzzles");
    println!("  books <discovered> <read>    report book counts");
    println!("  flag <name>                  raise a story flag");
    println!("  group <name> <items> <done>  report group progress (comma lists)");
    println!("  walk <n>                     report puzzles 1..=n, talking after each");
    println!("  talk                         start a conversation at the current beat");
    println!("  next                         continue the active playback");
    println!("  page                         show the next page of the current line");
    println!("  abort                        abort the active playback");
    println!("  status                       show beat, pending events, and ledger");
    println!("  seed <n>                     rebuild the engine with a new seed");
    println!("  help                         list commands");
    println!("  quit                         exit");
}
