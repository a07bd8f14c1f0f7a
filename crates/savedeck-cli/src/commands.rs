//! Command handlers. Each one works on the mounted deck and prints to stdout.

use std::path::Path;
use std::process::ExitCode;

use savedeck_core::app::SlotReport;
use savedeck_core::meta_file::render_meta;
use savedeck_core::prelude::*;
use savedeck_logic::fields::MetadataField;
use savedeck_logic::save_metadata::{Ending, Severity};
use serde_json::Value;

use crate::{Command, FlagAction};

pub fn execute(deck: &mut SaveDeck, command: Command) -> Result<ExitCode, SaveError> {
    match command {
        Command::List => list(deck)?,
        Command::Show { slot, json } => show(deck, &slot, json)?,
        Command::Check { all } => return check(deck, all),
        Command::Get { slot, field } => println!("{}", deck.get_field(&slot, &field)?),
        Command::Set { slot, field, value } => {
            let stored = deck.set_field(&slot, &field, &value)?;
            println!("{slot}: {field} = {stored}");
        }
        Command::New {
            slot,
            teleport,
            scene,
        } => {
            deck.create_slot(&slot, SaveMetadata::new_game(teleport, scene))?;
            println!("created {slot}");
        }
        Command::Flag { action } => return flag(deck, action),
        Command::Backup { slot } => {
            let path = deck.backup(&slot)?;
            println!("{}", path.display());
        }
        Command::Snapshots { slot } => {
            for path in deck.snapshots(&slot)? {
                println!("{}", path.display());
            }
        }
        Command::Restore { slot, snapshot } => {
            deck.restore(&slot, &snapshot)?;
            println!("restored {slot} from {}", snapshot.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ── list / show ─────────────────────────────────────────────────────────

fn list(deck: &mut SaveDeck) -> Result<(), SaveError> {
    let names = deck.slot_names()?;
    if names.is_empty() {
        println!("no save slots in {}", deck.root().display());
    }
    for name in names {
        match deck.open(&name) {
            Ok(open) => println!("{}", summary_line(&name, open.metadata())),
            Err(e) => println!("{name:<12} unreadable: {e}"),
        }
    }
    Ok(())
}

fn summary_line(name: &str, meta: &SaveMetadata) -> String {
    if !meta.exist {
        return format!("{name:<12} (empty)");
    }
    let ending = match meta.ending() {
        Ending::None => "",
        Ending::True => "  [true end]",
        Ending::Bad => "  [bad end]",
        Ending::Conflicting => "  [both endings?]",
    };
    format!(
        "{name:<12} Lv {:<3} gold {:<8} {:>10}  deaths {}{}{}",
        meta.level,
        meta.gold,
        meta.play_time_hms(),
        meta.death_count,
        if meta.second_time_play { "  NG+" } else { "" },
        ending,
    )
}

fn show(deck: &mut SaveDeck, name: &str, json: bool) -> Result<(), SaveError> {
    let open = deck.open(name)?;
    let meta = open.metadata();

    if json {
        println!("{}", json_text(meta, &open.slot().meta_path())?);
        return Ok(());
    }

    println!("=== {name} ===");
    for field in MetadataField::ALL {
        println!("  {:<22} {}", field.key(), field.get(meta));
    }
    for (key, value) in &meta.extra {
        println!("  {key:<22} {value}  (unmodeled)");
    }
    println!("  {:<22} {}", "play time", meta.play_time_hms());
    println!(
        "  {:<22} {}",
        "flags",
        open.flags().map(|f| f.len()).unwrap_or(0)
    );

    for issue in open.issues() {
        println!("  {} {issue}", severity_icon(issue.severity()));
    }
    Ok(())
}

fn json_text(meta: &SaveMetadata, path: &Path) -> Result<String, SaveError> {
    render_meta(meta, MetaStyle::Pretty).map_err(|source| SaveError::Meta {
        path: path.to_path_buf(),
        source,
    })
}

// ── check ───────────────────────────────────────────────────────────────

fn check(deck: &mut SaveDeck, all: bool) -> Result<ExitCode, SaveError> {
    println!("=== SaveDeck Check: {} ===\n", deck.root().display());
    let reports = deck.check()?;

    for report in &reports {
        for line in report_lines(report, all) {
            println!("{line}");
        }
    }

    let failed = reports.iter().filter(|r| r.has_errors()).count();
    let total = reports.len();
    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        total - failed,
        total,
        failed
    );

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn report_lines(report: &SlotReport, all: bool) -> Vec<String> {
    if let Some(err) = &report.load_error {
        return vec![format!("  ✗ {}: {}", report.name, err)];
    }
    if report.issues.is_empty() {
        return if all {
            vec![format!("  ✓ {}: ok", report.name)]
        } else {
            Vec::new()
        };
    }
    let head = if report.has_errors() { "✗" } else { "✓" };
    let mut lines = vec![format!("  {head} {}:", report.name)];
    lines.extend(
        report
            .issues
            .iter()
            .map(|i| format!("      {} {i}", severity_icon(i.severity()))),
    );
    lines
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error:",
        Severity::Warning => "warning:",
    }
}

// ── flags ───────────────────────────────────────────────────────────────

fn flag(deck: &mut SaveDeck, action: FlagAction) -> Result<ExitCode, SaveError> {
    match action {
        FlagAction::List { slot } => {
            let open = deck.open(&slot)?;
            match open.flags() {
                Some(store) if !store.is_empty() => {
                    for (name, value) in store.iter() {
                        println!("{name} = {}", flag_text(value));
                    }
                }
                _ => println!("{slot} has no flags"),
            }
        }
        FlagAction::Get { slot, path } => {
            let open = deck.open(&slot)?;
            let (name, field) = match path.split_once('.') {
                Some((name, field)) => (name, Some(field)),
                None => (path.as_str(), None),
            };
            let flag = open.flags().and_then(|f| f.get(name));
            let text = match (flag, field) {
                (Some(flag), None) => Some(flag_text(flag)),
                (Some(flag), Some(field)) => flag.field(field).map(ToString::to_string),
                (None, _) => None,
            };
            match text {
                Some(text) => println!("{text}"),
                None => {
                    eprintln!("{slot}: no flag {path}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        FlagAction::Set { slot, path, value } => {
            deck.set_flag(&slot, &path, &value)?;
            println!("{slot}: flag {path} = {}", FieldValue::parse_literal(&value));
        }
        FlagAction::Remove { slot, path } => {
            if !deck.remove_flag(&slot, &path)? {
                eprintln!("{slot}: no flag {path}");
                return Ok(ExitCode::FAILURE);
            }
            println!("{slot}: removed flag {path}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn flag_text(flag: &FlagValue) -> String {
    Value::from(flag.clone()).to_string()
}
