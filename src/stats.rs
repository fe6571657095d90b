//! Timing counters of the propagator. All times are wall-clock durations
//! accumulated with [`std::time::Instant`].

use std::fmt::{Display, Error, Formatter};
use std::time::Duration;

/// Time spent in the callbacks of a single solver thread.
#[derive(Clone, Default)]
pub struct ThreadStats {
    pub propagate: Duration,
    pub undo: Duration,
}

impl ThreadStats {
    pub fn total(&self) -> Duration {
        self.propagate + self.undo
    }
}

/// Aggregated timings of a solving run.
///
/// `init` and `per_thread` are filled by the propagator; the overall wall
/// time `total` is owned by the embedding program, which is the only place
/// where the full run is visible.
#[derive(Clone, Default)]
pub struct Stats {
    pub total: Duration,
    pub init: Duration,
    pub per_thread: Vec<ThreadStats>,
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        writeln!(f, "total: {}s", self.total.as_secs_f64())?;
        writeln!(f, "  init: {}s", self.init.as_secs_f64())?;
        for (thread, stat) in self.per_thread.iter().enumerate() {
            writeln!(f, "  total[{}]: {}s", thread, stat.total().as_secs_f64())?;
            writeln!(f, "    propagate: {}s", stat.propagate.as_secs_f64())?;
            writeln!(f, "    undo     : {}s", stat.undo.as_secs_f64())?;
        }
        Ok(())
    }
}
