use std::time::Duration;

/// timers count down at this rate, whatever the instruction rate is
pub const TIMER_HZ: u32 = 60;

/// advisory instruction rate; roughly ten instructions per timer tick
pub const DEFAULT_STEP_HZ: u32 = 600;

/// fastest instruction rate a driver should ask for
pub const MAX_STEP_HZ: u32 = 1_000_000;

/// a driver that falls further behind than this drops the backlog
const MAX_BACKLOG: Duration = Duration::from_secs(1);

/// how much work is owed for the time that has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Due {
    pub steps: u32,
    pub ticks: u32,
}

/// Turns wall-clock time into whole instruction steps and timer ticks, so a
/// driver can catch up if it ran late. It never sleeps and never hands out
/// work for time that hasn't happened yet.
#[derive(Debug, Clone)]
pub struct Pacer {
    step_period: Duration,
    tick_period: Duration,
    step_debt: Duration,
    tick_debt: Duration,
}

impl Pacer {
    pub fn new(step_hz: u32) -> Self {
        assert!(step_hz > 0, "Pacer needs a non-zero step rate");
        Pacer {
            // rates past 1GHz would round the period down to nothing
            step_period: (Duration::from_secs(1) / step_hz).max(Duration::from_nanos(1)),
            tick_period: Duration::from_secs(1) / TIMER_HZ,
            step_debt: Duration::ZERO,
            tick_debt: Duration::ZERO,
        }
    }

    /// account for `elapsed` and return what is now owed; remainders carry
    /// over to the next call
    pub fn advance(&mut self, elapsed: Duration) -> Due {
        self.step_debt = (self.step_debt + elapsed).min(MAX_BACKLOG);
        self.tick_debt = (self.tick_debt + elapsed).min(MAX_BACKLOG);
        Due {
            steps: Self::drain(&mut self.step_debt, self.step_period),
            ticks: Self::drain(&mut self.tick_debt, self.tick_period),
        }
    }

    /// time until the next step falls due
    pub fn until_next_step(&self) -> Duration {
        self.step_period.saturating_sub(self.step_debt)
    }

    fn drain(debt: &mut Duration, period: Duration) -> u32 {
        let whole = u32::try_from(debt.as_nanos() / period.as_nanos()).unwrap_or(u32::MAX);
        *debt -= period * whole;
        whole
    }
}
