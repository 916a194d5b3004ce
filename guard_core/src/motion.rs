//! Shared motion plumbing: publishing, stopping, timed moves and warm-up.
//!
//! Every guarded loop ends the same way: publish the stop command (zero twist
//! in the neutral frame) and return. On cancellation the stop is best-effort
//! and the loop reports `GuardError::Cancelled`.

use eyre::WrapErr;
use guard_traits::{Clock, VelocityCommand, VelocitySink};

use crate::cancel::CancelToken;
use crate::config::LoopCfg;
use crate::error::{GuardError, Report, Result};
use crate::force::ForceHandle;
use crate::hw_error::map_hw_error;
use crate::tick::Ticker;

/// Per-operation context handed to every loop.
#[derive(Clone, Copy)]
pub struct LoopCtx<'a> {
    pub clock: &'a dyn Clock,
    pub cancel: &'a CancelToken,
    pub cfg: LoopCfg,
}

impl<'a> LoopCtx<'a> {
    pub fn new(clock: &'a dyn Clock, cancel: &'a CancelToken, cfg: LoopCfg) -> Self {
        Self { clock, cancel, cfg }
    }

    pub fn ticker(&self) -> Ticker<'a> {
        Ticker::new(self.clock, self.cfg.rate_hz)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Publish one command, mapping driver errors to `GuardError`.
pub fn publish(sink: &mut dyn VelocitySink, cmd: &VelocityCommand) -> Result<()> {
    sink.publish(cmd)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("publish velocity command")
}

pub fn stop(sink: &mut dyn VelocitySink) -> Result<()> {
    publish(sink, &VelocityCommand::stop())
}

/// Best-effort stop, then the cancellation error for the caller to return.
pub fn cancelled(sink: &mut dyn VelocitySink) -> Report {
    if let Err(e) = stop(sink) {
        tracing::warn!(error = %e, "stop after cancellation failed");
    }
    tracing::info!("motion cancelled");
    eyre::Report::new(GuardError::Cancelled)
}

/// Publish `cmd` every tick for `ticks` ticks, then stop.
pub fn timed_move(
    ctx: &LoopCtx<'_>,
    sink: &mut dyn VelocitySink,
    cmd: &VelocityCommand,
    ticks: u32,
) -> Result<()> {
    let mut ticker = ctx.ticker();
    for _ in 0..ticks {
        if ctx.is_cancelled() {
            return Err(cancelled(sink));
        }
        publish(sink, cmd)?;
        ticker.wait();
    }
    stop(sink)
}

/// Hold the arm still until the force window has warmed up.
///
/// Publishes the stop command each tick so a watchdog on the driver side
/// keeps seeing traffic. Fails with `WarmupExpired` after the configured
/// patience.
pub fn await_warm(ctx: &LoopCtx<'_>, sink: &mut dyn VelocitySink, force: &ForceHandle) -> Result<()> {
    let patience = ctx.cfg.warmup_patience_ticks;
    let mut ticker = ctx.ticker();
    let mut waited = 0u32;
    loop {
        if force.is_warm() {
            if waited > 0 {
                tracing::debug!(ticks = waited, "force window warm");
            }
            return Ok(());
        }
        if ctx.is_cancelled() {
            return Err(cancelled(sink));
        }
        if waited >= patience {
            stop(sink)?;
            return Err(eyre::Report::new(GuardError::WarmupExpired { ticks: waited }));
        }
        stop(sink)?;
        ticker.wait();
        waited += 1;
    }
}
