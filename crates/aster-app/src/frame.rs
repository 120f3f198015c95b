//! Frame sequencing state and per-frame derived values.

use aster_gpu::GpuError;

/// Phase of the single frame in flight.
///
/// Each logical frame moves through every phase in order and ends back at
/// `Idle`. Transitions go through [`FramePhase::advance`], which rejects
/// anything but the successor phase, so a skipped or repeated step shows
/// up as an error instead of a GPU hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames; nothing submitted for this frame yet.
    Idle,
    /// Frame fence waited and reset; acquiring a swapchain image.
    Acquiring,
    /// Image acquired; commands are being recorded.
    Recording,
    /// Command buffer submitted to the graphics queue.
    Submitted,
    /// Submission handed to the presentation engine.
    Presenting,
}

impl FramePhase {
    /// The phase that legally follows this one.
    pub fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Acquiring,
            Self::Acquiring => Self::Recording,
            Self::Recording => Self::Submitted,
            Self::Submitted => Self::Presenting,
            Self::Presenting => Self::Idle,
        }
    }

    /// Advance to `next`, failing when `next` is not the successor.
    ///
    /// On failure the phase is left unchanged.
    pub fn advance(&mut self, next: Self) -> Result<(), GpuError> {
        if next != self.successor() {
            return Err(GpuError::InvalidState(format!(
                "frame phase {self:?} cannot advance to {next:?}"
            )));
        }
        *self = next;
        Ok(())
    }
}

/// Animated clear color for a frame: a blue channel flashing on a
/// 120-frame period.
pub fn clear_color(frame_number: u64) -> [f32; 4] {
    let flash = (frame_number as f32 / 120.0).sin().abs();
    [0.0, 0.0, flash, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_cycle_completes_a_frame() {
        let mut phase = FramePhase::Idle;

        phase.advance(FramePhase::Acquiring).unwrap();
        phase.advance(FramePhase::Recording).unwrap();
        phase.advance(FramePhase::Submitted).unwrap();
        phase.advance(FramePhase::Presenting).unwrap();
        phase.advance(FramePhase::Idle).unwrap();

        assert_eq!(phase, FramePhase::Idle);
    }

    #[test]
    fn phase_cycle_repeats_across_frames() {
        let mut phase = FramePhase::Idle;

        for _ in 0..450 {
            for _ in 0..5 {
                let next = phase.successor();
                phase.advance(next).unwrap();
            }
            assert_eq!(phase, FramePhase::Idle);
        }
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut phase = FramePhase::Idle;

        let result = phase.advance(FramePhase::Recording);

        assert!(matches!(result, Err(GpuError::InvalidState(_))));
        assert_eq!(phase, FramePhase::Idle);
    }

    #[test]
    fn repeating_a_phase_is_rejected() {
        let mut phase = FramePhase::Idle;
        phase.advance(FramePhase::Acquiring).unwrap();

        assert!(phase.advance(FramePhase::Acquiring).is_err());
        assert_eq!(phase, FramePhase::Acquiring);
    }

    #[test]
    fn clear_color_starts_black_and_flashes_blue() {
        let start = clear_color(0);
        assert_eq!(start, [0.0, 0.0, 0.0, 1.0]);

        // Peak of the first sine arch, at frame round(pi / 2 * 120)
        let peak = clear_color(188);
        assert!(peak[2] > 0.99);
        assert_eq!(peak[0], 0.0);
        assert_eq!(peak[1], 0.0);
        assert_eq!(peak[3], 1.0);
    }

    #[test]
    fn clear_color_returns_to_black_each_half_period() {
        // One half period of |sin| is pi * 120 frames
        let trough = clear_color(377);
        assert!(trough[2] < 0.01);
    }
}
