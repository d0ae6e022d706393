use std::{
    fs::File,
    io::{self, Read},
    process::ExitCode,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use args::{convert_filter, Args};
use clap::Parser;
use datalog_slurper::{
    activity::Segmenter,
    capture::run_session,
    exfil::{export_session, ExportConfig, ExportMode},
    monitoring::describe,
    ChannelEvent, Reconstructor, Result,
};
use tracing::{debug, error, info, warn};

mod args;

// How many channel events the monitor may fall behind by
const EVENT_CAPACITY: usize = 1024;

fn run(args: Args) -> Result<usize> {
    // Ctrl-C ends the session, whatever has been decoded so far gets saved.
    // It is noticed between records, an idle input has to deliver one more (or EOF)
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        warn!("Unable to catch Ctrl-C: {}", e);
    }

    // Replay the activities through the recorder
    let mut segmenter = Segmenter::new();
    for span in &args.activity {
        let index = segmenter.start_at(span.start_ms)?;
        segmenter.stop_at(span.end_ms)?;
        segmenter.label(index, span.label)?;
    }

    let reader: Box<dyn Read + Send> = match &args.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };

    let mut reconstructor = Reconstructor::new();
    let events = reconstructor.subscribe(EVENT_CAPACITY);
    let monitor = thread::spawn(move || {
        for event in events {
            match event {
                ChannelEvent::Desynced { channel, reason } => {
                    debug!(%channel, "Flush buffers and try again: {}", reason)
                }
                event => debug!(?event, "Channel event"),
            }
        }
    });

    let captured = run_session(reader, args.capacity as usize, &running, &mut reconstructor)?;
    info!("Session finished after {} records", captured);
    let channels = reconstructor.finish();
    // The reconstructor held the only sender
    let _ = monitor.join();

    for channel in &channels {
        info!(channel = %channel.label(), "{}", describe(channel));
    }

    let mode = if args.all {
        ExportMode::All
    } else {
        ExportMode::PerActivity
    };
    if mode == ExportMode::PerActivity && segmenter.labeled().next().is_none() {
        warn!("No labeled activities, nothing to save (try --all)");
    }
    let config = ExportConfig {
        tolerance_ms: args.tolerance_ms,
    };
    let results = export_session(&args.output_dir, &channels, &segmenter, mode, &config);
    let mut failed = 0;
    for result in &results {
        if let Err(e) = result {
            error!("Unable to save readings: {}", e);
            failed += 1;
        }
    }
    info!("Saved {} of {} files", results.len() - failed, results.len());
    Ok(failed)
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();
    match run(args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!("{} files could not be saved", failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
