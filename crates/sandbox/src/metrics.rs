use std::fmt;

use serde::Serialize;

/// Per-frame diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameMetrics {
    pub frame: u32,
    /// Wall-clock time spent stepping this frame.
    pub step_ms: f32,
    pub particle_count: usize,
    pub max_speed: f32,
    pub mean_height: f32,
    /// Positions or velocities that are NaN or infinite.
    pub non_finite: usize,
    /// Rope only: live edges.
    pub edge_count: Option<usize>,
    /// Fluid only: particles outside the domain at the last neighbor search.
    pub out_of_bounds: Option<usize>,
    /// Fluid only: current +x wall position.
    pub wall_x: Option<f32>,
}

impl FrameMetrics {
    pub fn is_healthy(&self) -> bool {
        self.non_finite == 0
    }
}

impl fmt::Display for FrameMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:5} | {:7.2} ms | n={} | v_max={:.3} | y_mean={:.3}",
            self.frame, self.step_ms, self.particle_count, self.max_speed, self.mean_height
        )?;
        if let Some(edges) = self.edge_count {
            write!(f, " | edges={}", edges)?;
        }
        if let Some(oob) = self.out_of_bounds {
            write!(f, " | oob={}", oob)?;
        }
        if let Some(x) = self.wall_x {
            write!(f, " | wall={:.3}", x)?;
        }
        if self.non_finite > 0 {
            write!(f, " | NON-FINITE={}", self.non_finite)?;
        }
        Ok(())
    }
}

/// Aggregate over a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames: u32,
    pub total_ms: f32,
    pub peak_speed: f32,
    pub unhealthy_frames: u32,
    pub last: FrameMetrics,
}

impl RunSummary {
    pub fn record(&mut self, metrics: &FrameMetrics) {
        self.frames += 1;
        self.total_ms += metrics.step_ms;
        self.peak_speed = self.peak_speed.max(metrics.max_speed);
        if !metrics.is_healthy() {
            self.unhealthy_frames += 1;
        }
        self.last = metrics.clone();
    }

    pub fn mean_step_ms(&self) -> f32 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_ms / self.frames as f32
        }
    }
}
