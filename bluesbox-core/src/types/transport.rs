//! Transport state and the tempo/swing/loop timing arithmetic
//!
//! All times are in seconds on the audio clock. The bar is 4/4 and divided
//! into sixteen sixteenth-note steps.

/// Lowest accepted tempo in BPM
pub const MIN_TEMPO: u32 = 60;
/// Highest accepted tempo in BPM
pub const MAX_TEMPO: u32 = 160;
/// Sixteenth-note steps per bar
pub const STEPS_PER_BAR: usize = 16;
/// Sixteenth-note steps per beat
pub const STEPS_PER_BEAT: usize = 4;
/// Beats per bar (4/4)
pub const BEATS_PER_BAR: usize = 4;
/// Shortest loop span in bars
pub const MIN_BAR_SPAN: u32 = 1;
/// Longest loop span in bars
pub const MAX_BAR_SPAN: u32 = 16;

/// Clamp a requested tempo into the accepted range
pub fn clamp_tempo(bpm: i64) -> u32 {
    bpm.clamp(MIN_TEMPO as i64, MAX_TEMPO as i64) as u32
}

/// Clamp a requested loop span into the accepted range
pub fn clamp_bar_span(bars: i64) -> u32 {
    bars.clamp(MIN_BAR_SPAN as i64, MAX_BAR_SPAN as i64) as u32
}

/// Duration of one beat in seconds
pub fn seconds_per_beat(tempo: u32) -> f64 {
    60.0 / tempo as f64
}

/// Duration of one sixteenth note in seconds
pub fn sixteenth(tempo: u32) -> f64 {
    seconds_per_beat(tempo) / 4.0
}

/// Duration of one bar in seconds
pub fn seconds_per_bar(tempo: u32) -> f64 {
    seconds_per_beat(tempo) * BEATS_PER_BAR as f64
}

/// Swung duration of a step: the gap leading into it from the previous step.
///
/// Odd-indexed steps get `2 * sixteenth * swing`, even-indexed steps the
/// complement, so each pair sums to one eighth note. With `swing > 0.5`
/// the off-sixteenths land late, which is the shuffle feel.
pub fn step_duration(step: usize, tempo: u32, swing: f64) -> f64 {
    let eighth = sixteenth(tempo) * 2.0;
    if step % 2 == 1 {
        eighth * swing
    } else {
        eighth * (1.0 - swing)
    }
}

/// Playback rate that stretches a buffer of `buffer_duration` seconds to
/// fill exactly `bar_span` bars at `tempo`
pub fn loop_playback_rate(buffer_duration: f64, bar_span: u32, tempo: u32) -> f64 {
    buffer_duration / (bar_span as f64 * seconds_per_bar(tempo))
}

/// Offset (in transport seconds) into a `bar_span`-bar loop that lines its
/// bar boundaries up with the transport's running `bar_index`
pub fn loop_start_offset(bar_index: usize, bar_span: u32, tempo: u32) -> f64 {
    let span = bar_span.max(1) as usize;
    (bar_index % span) as f64 * seconds_per_bar(tempo)
}

/// Snapshot of the transport, published after every step
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportState {
    pub playing: bool,
    /// Tempo in BPM, always within [MIN_TEMPO, MAX_TEMPO]
    pub tempo: u32,
    /// Sixteenth-note step within the current bar, always < 16
    pub step: usize,
    /// Bar within the progression, always < progression length
    pub bar_index: usize,
    /// Audio-clock time of the next scheduled step
    pub next_event_time: f64,
}

impl TransportState {
    /// A stopped transport at the given tempo
    pub fn stopped(tempo: u32) -> Self {
        Self {
            playing: false,
            tempo: clamp_tempo(tempo as i64),
            step: 0,
            bar_index: 0,
            next_event_time: 0.0,
        }
    }

    /// Beat (0-3) the current step falls in
    pub fn beat(&self) -> usize {
        self.step / STEPS_PER_BEAT
    }

    /// Whether the current step sits on a beat
    pub fn on_beat(&self) -> bool {
        self.step % STEPS_PER_BEAT == 0
    }

    pub fn seconds_per_beat(&self) -> f64 {
        seconds_per_beat(self.tempo)
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::stopped(crate::types::sequence::Groove::default().default_tempo())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_tempo() {
        assert_eq!(clamp_tempo(10), MIN_TEMPO);
        assert_eq!(clamp_tempo(500), MAX_TEMPO);
        assert_eq!(clamp_tempo(96), 96);
    }

    #[test]
    fn test_clamp_bar_span() {
        assert_eq!(clamp_bar_span(0), 1);
        assert_eq!(clamp_bar_span(-3), 1);
        assert_eq!(clamp_bar_span(40), 16);
    }

    #[test]
    fn test_step_duration_swing() {
        // 120 BPM: sixteenth = 0.125 s, eighth = 0.25 s
        assert!((step_duration(1, 120, 0.6) - 0.15).abs() < 1e-12);
        assert!((step_duration(0, 120, 0.6) - 0.10).abs() < 1e-12);
        assert!((step_duration(2, 120, 0.5) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_loop_rate_identity() {
        // A 2 s buffer is exactly one bar at 120 BPM
        assert!((loop_playback_rate(2.0, 1, 120) - 1.0).abs() < 1e-12);
        // Same buffer spread over two bars plays at half speed
        assert!((loop_playback_rate(2.0, 2, 120) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_loop_offset() {
        let spb = seconds_per_beat(100);
        assert!((loop_start_offset(5, 4, 100) - 4.0 * spb).abs() < 1e-12);
        assert_eq!(loop_start_offset(8, 4, 100), 0.0);
    }

    #[test]
    fn test_stopped_state() {
        let state = TransportState::stopped(300);
        assert!(!state.playing);
        assert_eq!(state.tempo, MAX_TEMPO);
        assert_eq!(state.step, 0);
        assert_eq!(state.bar_index, 0);
    }
}
