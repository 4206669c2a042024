/// Content Linter — validates a narrative catalog before it ships.
///
/// Usage: content_linter <catalog.ron | catalog_dir> [--page-width <n>]

use std::collections::BTreeSet;
use std::process;

use rustc_hash::FxHashMap;
use storybeat_engine::core::catalog::{Catalog, ContentIssue, RonContentStore};
use storybeat_engine::core::config::DEFAULT_PAGE_WIDTH;
use storybeat_engine::core::paginate::paginate;
use tracing_subscriber::EnvFilter;

/// Lines that need more pages than this are flagged.
const MAX_PAGES_PER_LINE: usize = 3;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: content_linter <catalog.ron | catalog_dir> [--page-width <n>]");
        process::exit(0);
    }

    let content_path = &args[1];
    let mut page_width = DEFAULT_PAGE_WIDTH;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--page-width" && i + 1 < args.len() {
            i += 1;
            page_width = args[i].parse().unwrap_or(DEFAULT_PAGE_WIDTH);
        }
        i += 1;
    }

    let raw = match RonContentStore::new(content_path).load_raw() {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    let (catalog, issues) = match Catalog::validate(raw) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} beats, {} characters, {} events, {} banter lines, {} rules",
        catalog.beats().len(),
        catalog.characters().len(),
        catalog.events().len(),
        catalog.banter().len(),
        catalog.rules().len()
    );

    let (errors, warnings) = lint_catalog(&catalog, &issues, page_width);

    println!("\n=== Content Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_catalog(
    catalog: &Catalog,
    issues: &[ContentIssue],
    page_width: usize,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Anything the loader had to drop is an error; kept-but-odd content warns.
    for issue in issues {
        if issue.is_skip() {
            errors.push(issue.to_string());
        } else {
            warnings.push(issue.to_string());
        }
    }

    // Same-priority rules out of one beat are resolved by declaration order.
    let mut priorities: FxHashMap<(&str, u32), Vec<&str>> = FxHashMap::default();
    for rule in catalog.rules() {
        priorities
            .entry((rule.from.as_str(), rule.priority))
            .or_default()
            .push(rule.to.as_str());
    }
    let mut ties: Vec<_> = priorities
        .into_iter()
        .filter(|(_, targets)| targets.len() > 1)
        .collect();
    ties.sort();
    for ((from, priority), targets) in ties {
        warnings.push(format!(
            "Beat '{}' has {} rules at priority {} ({}); the first declared wins",
            from,
            targets.len(),
            priority,
            targets.join(", ")
        ));
    }

    // A beat nothing leads into is never reached (the first beat is the start).
    let targets: BTreeSet<&str> = catalog.rules().iter().map(|r| r.to.as_str()).collect();
    for beat in catalog.beats().beats().iter().skip(1) {
        if !targets.contains(beat.as_str()) {
            warnings.push(format!("Beat '{}' is not the target of any rule", beat));
        }
    }

    for character in catalog.characters() {
        if !catalog.banter().iter().any(|b| b.character == character.id) {
            warnings.push(format!("Character '{}' has no banter lines", character.id));
        }
    }

    for event in catalog.events() {
        for (index, line) in event.lines.iter().enumerate() {
            let pages = paginate(&line.text, page_width).len();
            if pages > MAX_PAGES_PER_LINE {
                warnings.push(format!(
                    "Event '{}' line {} needs {} pages at width {}",
                    event.id, index, pages, page_width
                ));
            }
        }
    }

    (errors, warnings)
}
