#![forbid(unsafe_code)]

//! Tally Counter binary entry point.

use std::io;

use tally_counter::click::spawn_click_listener;
use tally_counter::cli;
use tally_counter::logging::init_logging;
use tally_counter::{CounterController, CounterModel, build_controller};
use tally_runtime::{ControllerError, TerminalSink};
use tracing::{info, warn};

fn main() {
    let opts = cli::Opts::parse();
    init_logging(&opts.log_level, opts.log_json);

    let mut controller = match build_controller(&opts.counter_options(), TerminalSink::stdout()) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Failed to initialize: {e}");
            std::process::exit(1);
        }
    };

    let result = run(&mut controller, &opts);
    if let Err(e) = controller.view_handle().borrow_mut().sink_mut().finish() {
        warn!(error = %e, "could not finish the counter line");
    }
    if let Err(e) = result {
        eprintln!("Runtime error: {e}");
        std::process::exit(1);
    }
}

fn run(
    controller: &mut CounterController<TerminalSink<io::Stdout>>,
    opts: &cli::Opts,
) -> Result<(), ControllerError> {
    if !opts.autostart {
        eprintln!("Press Enter to start the counter.");
    }
    controller.attach_views()?;
    let sender = controller.listen_events(CounterModel::increment)?;

    if opts.autostart {
        sender.start();
    } else if let Err(e) = spawn_click_listener(io::BufReader::new(io::stdin()), sender) {
        warn!(error = %e, "stdin listener unavailable; pass --autostart");
    }

    let limit = opts.ticks;
    info!(
        interval_ms = opts.interval_ms,
        ticks = limit,
        autostart = opts.autostart,
        "counter ready"
    );
    controller.run_until(|c| limit > 0 && c.ticks() >= limit)?;
    controller.stop();
    Ok(())
}
