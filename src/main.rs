//! SpaceSleuth: incremental, failure-tolerant disk usage analyser.
//!
//! Thin binary entry point. All scanning logic lives in the
//! `spacesleuth-core` crate; this file drives a `ScanSession`, prints
//! results as they arrive, and renders the final report.

mod cli;
mod report;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Args;
use crossbeam_channel::Receiver;
use report::Report;
use spacesleuth_core::{format_bytes, ScanSession, SessionEvent};
use std::io::Write;
use std::time::Duration;

/// How long one pump of the session may block waiting for messages.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `--json` output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("SpaceSleuth starting");

    let config = args.engine_config()?;
    let mut session = ScanSession::new(config).context("starting scan engine")?;
    let events = session.subscribe();
    let live = !args.json;

    session.scan(args.path.clone());
    pump(&mut session, &events, live);

    let root = session.state().root.clone().unwrap_or_default();
    for name in &args.expand {
        let path = root.join(name);
        let Some(id) = session.find(&path) else {
            bail!("{} is not a listed entry; expand its parent first", path.display());
        };
        session
            .expand(id)
            .with_context(|| format!("expanding {}", path.display()))?;
        pump(&mut session, &events, live);
    }

    let report = Report::from_session(&session);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        report.write_json(&mut out)?;
    } else {
        report.render_table(&mut out)?;
    }
    out.flush()?;

    if let Some(csv_path) = &args.csv {
        report.write_csv(csv_path)?;
        tracing::info!("Report saved to {}", csv_path.display());
    }

    Ok(())
}

/// Drive the session until it is idle, echoing progress to stderr.
fn pump(session: &mut ScanSession, events: &Receiver<SessionEvent>, live: bool) {
    loop {
        let idle = session.wait_until_idle(PUMP_INTERVAL);
        for event in events.try_iter() {
            if live {
                print_progress(session, &event);
            }
        }
        if idle {
            break;
        }
    }
}

fn print_progress(session: &ScanSession, event: &SessionEvent) {
    match event {
        SessionEvent::EntryUpdated { id } => {
            if let Some(entry) = session.entry(*id) {
                let size = entry.size_value().map(format_bytes).unwrap_or_default();
                eprintln!("  {size:>14}  {}", entry.path.display());
            }
        }
        SessionEvent::Fault(fault) => tracing::debug!("{fault}"),
        SessionEvent::ScanFinished {
            total, duration, ..
        } => {
            eprintln!(
                "Scanned {} in {:.2}s",
                format_bytes(i64::try_from(*total).unwrap_or(i64::MAX)),
                duration.as_secs_f64()
            );
        }
        _ => {}
    }
}
