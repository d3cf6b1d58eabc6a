//! Wall-clock timing of stages and runs.

use std::time::Instant;

/// Measures how long a named unit of work took.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts timing `name`.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Elapsed milliseconds so far.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// The timed unit's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and returns elapsed milliseconds.
    #[must_use]
    pub fn finish(self) -> u64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("planner");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(timer.name(), "planner");
        assert!(timer.finish() >= 10);
    }
}
