#![forbid(unsafe_code)]

//! Line-based "click" input: every line read is a press of the start button.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use tally_runtime::TriggerSender;
use tracing::{debug, warn};

/// Send a start trigger for every line of `input`.
///
/// If the input ends (or fails) before any start was sent, a stop trigger is
/// sent instead, since the counter could otherwise never start. Returns the
/// number of start triggers sent.
pub fn forward_clicks(input: impl BufRead, sender: &TriggerSender) -> usize {
    let mut clicks = 0;
    for line in input.lines() {
        if let Err(e) = line {
            warn!(error = %e, "click input failed");
            break;
        }
        if !sender.start() {
            debug!("controller gone, click listener exiting");
            return clicks;
        }
        clicks += 1;
    }
    if clicks == 0 {
        warn!("click input closed before the counter started; stopping");
        sender.stop();
    }
    clicks
}

/// Forward clicks from `input` on a dedicated thread.
///
/// # Errors
///
/// Returns the spawn error if the thread could not be started.
pub fn spawn_click_listener<R>(input: R, sender: TriggerSender) -> io::Result<JoinHandle<usize>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("tally-stdin".into())
        .spawn(move || forward_clicks(input, &sender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tally_runtime::{Trigger, TriggerInbox};

    fn drain(inbox: &TriggerInbox) -> Vec<Trigger> {
        std::iter::from_fn(|| inbox.try_next()).collect()
    }

    #[test]
    fn each_line_is_a_start() {
        let inbox = TriggerInbox::new();
        let clicks = forward_clicks(Cursor::new("\n\n"), &inbox.sender());
        assert_eq!(clicks, 2);
        assert_eq!(drain(&inbox), [Trigger::Start, Trigger::Start]);
    }

    #[test]
    fn closed_input_before_any_click_stops() {
        let inbox = TriggerInbox::new();
        let clicks = forward_clicks(Cursor::new(""), &inbox.sender());
        assert_eq!(clicks, 0);
        assert_eq!(drain(&inbox), [Trigger::Stop]);
    }

    #[test]
    fn closed_input_after_a_click_leaves_timer_running() {
        let inbox = TriggerInbox::new();
        forward_clicks(Cursor::new("go\n"), &inbox.sender());
        assert_eq!(drain(&inbox), [Trigger::Start]);
    }

    #[test]
    fn listener_thread_reports_clicks() {
        let inbox = TriggerInbox::new();
        let handle = spawn_click_listener(Cursor::new("\n"), inbox.sender()).unwrap();
        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(inbox.next(), Some(Trigger::Start));
    }
}
