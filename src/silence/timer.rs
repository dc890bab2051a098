//! Activity-driven silence timer.
//!
//! A restartable countdown: each activity signal re-arms a fresh threshold;
//! when the countdown expires without further activity the callback fires
//! exactly once, and the timer suspends until explicitly resumed.

use crate::defaults;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the silence timer.
#[derive(Debug, Clone, Copy)]
pub struct SilenceTimerConfig {
    /// Countdown restarted by every activity signal.
    pub threshold: Duration,
}

impl Default for SilenceTimerConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(defaults::SILENCE_DURATION_MS as u64),
        }
    }
}

enum TimerCmd {
    Start,
    Activity,
    Pause,
    Resume,
    Stop,
}

/// Worker-side timer mode. At most one pending deadline exists at a time;
/// re-arming always replaces the previous one.
enum Mode {
    /// Not started, or stopped.
    Disarmed,
    /// Started, waiting for the first activity signal. No countdown runs.
    Armed,
    /// Counting down toward the deadline.
    Counting(Instant),
    /// Fired or paused; will not count again until resumed.
    Suspended,
}

/// Restartable silence countdown driven by activity signals.
///
/// All control methods are non-blocking sends to a single worker thread, so
/// they are safe to call from component callbacks and through a shared
/// reference.
pub struct SilenceTimer {
    cmd_tx: Sender<TimerCmd>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SilenceTimer {
    /// Creates the timer with its silence callback. The timer starts disarmed;
    /// call [`SilenceTimer::start`] to begin accepting activity.
    pub fn new<F>(config: SilenceTimerConfig, on_silence: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = unbounded();
        let threshold = config.threshold;

        let worker = thread::spawn(move || {
            let mut mode = Mode::Disarmed;
            loop {
                let cmd = match mode {
                    Mode::Counting(deadline) => {
                        let now = Instant::now();
                        if deadline <= now {
                            on_silence();
                            mode = Mode::Suspended;
                            continue;
                        }
                        match cmd_rx.recv_timeout(deadline - now) {
                            Ok(cmd) => cmd,
                            Err(RecvTimeoutError::Timeout) => {
                                on_silence();
                                mode = Mode::Suspended;
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    _ => match cmd_rx.recv() {
                        Ok(cmd) => cmd,
                        Err(_) => break,
                    },
                };

                match cmd {
                    TimerCmd::Start => mode = Mode::Armed,
                    TimerCmd::Activity => {
                        if matches!(mode, Mode::Armed | Mode::Counting(_)) {
                            mode = Mode::Counting(Instant::now() + threshold);
                        }
                    }
                    TimerCmd::Pause => {
                        if !matches!(mode, Mode::Disarmed) {
                            mode = Mode::Suspended;
                        }
                    }
                    TimerCmd::Resume => {
                        if !matches!(mode, Mode::Disarmed) {
                            mode = Mode::Armed;
                        }
                    }
                    TimerCmd::Stop => break,
                }
            }
        });

        Self {
            cmd_tx,
            worker: std::sync::Mutex::new(Some(worker)),
        }
    }

    /// Arms the timer: it now waits for the first activity signal. No
    /// countdown runs until activity arrives.
    pub fn start(&self) {
        let _ = self.cmd_tx.send(TimerCmd::Start);
    }

    /// Signals activity: cancels any pending countdown and restarts a fresh
    /// threshold. No-op when the timer is disarmed or suspended.
    pub fn activity(&self) {
        let _ = self.cmd_tx.send(TimerCmd::Activity);
    }

    /// Cancels the pending countdown without disarming the timer.
    pub fn pause(&self) {
        let _ = self.cmd_tx.send(TimerCmd::Pause);
    }

    /// Re-arms a suspended timer for the next utterance. The countdown starts
    /// on the next activity signal, not immediately.
    pub fn resume(&self) {
        let _ = self.cmd_tx.send(TimerCmd::Resume);
    }

    /// Fully deactivates the timer and reclaims the worker. Idempotent.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(TimerCmd::Stop);
        let worker = self.worker.lock().ok().and_then(|mut slot| slot.take());
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

impl Drop for SilenceTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
