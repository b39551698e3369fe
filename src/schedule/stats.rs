use std::time::Duration;

/// Default number of frames rolled into one [`RenderingStats`] snapshot.
pub const DEFAULT_STATS_WINDOW: u32 = 60;

/// Periodic frame-time snapshot, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderingStats {
    /// Slowest frame in the window.
    pub max_frame_time: f64,
    /// Mean frame time over the window.
    pub average_frame_time: f64,
}

/// Rolls individual frame timings into one snapshot every `window` frames.
#[derive(Clone, Debug)]
pub struct StatsAccumulator {
    window: u32,
    frames: u32,
    total_ms: f64,
    max_ms: f64,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_WINDOW)
    }
}

impl StatsAccumulator {
    /// Create an accumulator emitting every `window` frames (minimum 1).
    pub fn new(window: u32) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            total_ms: 0.0,
            max_ms: 0.0,
        }
    }

    /// Configured window length.
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Frames recorded since the last snapshot.
    pub fn pending_frames(&self) -> u32 {
        self.frames
    }

    /// Record one frame; returns a snapshot and resets when the window is full.
    pub fn record(&mut self, frame_time: Duration) -> Option<RenderingStats> {
        let ms = frame_time.as_secs_f64() * 1000.0;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
        self.frames += 1;

        if self.frames < self.window {
            return None;
        }
        let stats = RenderingStats {
            max_frame_time: self.max_ms,
            average_frame_time: self.total_ms / f64::from(self.frames),
        };
        self.frames = 0;
        self.total_ms = 0.0;
        self.max_ms = 0.0;
        Some(stats)
    }
}

/// Sum of snapshots reported by one backend since the accumulator was last drained.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceStats {
    /// Number of snapshots folded in.
    pub frames_count: u32,
    /// Sum of snapshot averages (ms).
    pub total_render_time: f64,
    /// Largest snapshot maximum (ms).
    pub max_frame_time: f64,
}

impl PerformanceStats {
    /// Fold one snapshot in.
    pub fn accumulate(&mut self, stats: &RenderingStats) {
        self.frames_count += 1;
        self.total_render_time += stats.average_frame_time;
        self.max_frame_time = self.max_frame_time.max(stats.max_frame_time);
    }

    /// Mean of the folded averages; `0.0` when empty.
    pub fn average_frame_time(&self) -> f64 {
        if self.frames_count == 0 {
            0.0
        } else {
            self.total_render_time / f64::from(self.frames_count)
        }
    }

    /// Collapse back into a single snapshot.
    pub fn snapshot(&self) -> RenderingStats {
        RenderingStats {
            max_frame_time: self.max_frame_time,
            average_frame_time: self.average_frame_time(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/stats.rs"]
mod tests;
