//! Stage timing for a single request.

use crate::request::types::TimingInfo;
use std::time::Instant;

/// Measured stages of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dns,
    Tcp,
    Tls,
    /// Request written until the response head arrives.
    Wait,
    Download,
}

impl Stage {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            Stage::Dns => 0,
            Stage::Tcp => 1,
            Stage::Tls => 2,
            Stage::Wait => 3,
            Stage::Download => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: Instant,
    end: Option<Instant>,
}

#[derive(Debug)]
pub struct DetailedTiming {
    started: Instant,
    spans: [Option<Span>; Stage::COUNT],
}

impl DetailedTiming {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            spans: [None; Stage::COUNT],
        }
    }

    pub fn begin(&mut self, stage: Stage) {
        self.spans[stage.index()] = Some(Span {
            start: Instant::now(),
            end: None,
        });
    }

    pub fn end(&mut self, stage: Stage) {
        if let Some(span) = self.spans[stage.index()].as_mut() {
            span.end = Some(Instant::now());
        }
    }

    /// Milliseconds spent in a finished stage.
    pub fn elapsed_ms(&self, stage: Stage) -> Option<u64> {
        let span = self.spans[stage.index()]?;
        span.end
            .map(|end| end.duration_since(span.start).as_millis() as u64)
    }

    pub fn to_timing_info(&self) -> TimingInfo {
        let finished = self
            .spans
            .iter()
            .flatten()
            .filter_map(|span| span.end)
            .max()
            .unwrap_or_else(Instant::now);

        TimingInfo {
            total: finished.duration_since(self.started).as_millis() as u64,
            dns: self.elapsed_ms(Stage::Dns),
            tcp: self.elapsed_ms(Stage::Tcp),
            tls: self.elapsed_ms(Stage::Tls),
            ttfb: self.elapsed_ms(Stage::Wait),
            download: self.elapsed_ms(Stage::Download),
        }
    }
}

impl Default for DetailedTiming {
    fn default() -> Self {
        Self::new()
    }
}
