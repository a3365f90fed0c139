mod timer;

pub use timer::{FrameTimingStats, HighPrecisionTimer, ManualTimer, Timer, frame_timing_stats};
