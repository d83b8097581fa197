use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gpibprims_session::Instrument;

use crate::cmd::{parse_duration, Context, WatchArgs};
use crate::exit::{session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_reply, OutputFormat, Reply};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub fn run(args: WatchArgs, ctx: &Context, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let address = ctx.resolve(&args.device)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let instrument =
        Instrument::open(&ctx.manager, &address).map_err(|err| session_error("open failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let response = instrument
            .ask(&args.command)
            .map_err(|err| session_error("prompt failed", err))?;
        print_reply(
            &Reply {
                device: &args.device,
                address: &address,
                command: Some(&args.command),
                response: &response,
            },
            format,
        );
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
        pause(interval, &running);
    }

    instrument
        .close()
        .map_err(|err| session_error("close failed", err))?;
    Ok(SUCCESS)
}

/// Sleep for `interval`, waking early once `running` is cleared.
fn pause(interval: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let started = Instant::now();
        pause(Duration::from_secs(5), &running);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pause_waits_for_interval() {
        let running = AtomicBool::new(true);
        let started = Instant::now();
        pause(Duration::from_millis(120), &running);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }
}
