//! Adaptive difficulty controller.
//!
//! Pure arithmetic, no I/O, no failure modes. The session engine feeds
//! each round's correctness back through [`next_difficulty`] and asks
//! [`tolerance`] how wide a difficulty band to request questions from.

/// Tuning constants for the adaptive test.
///
/// These values are load-bearing for score comparability: results
/// produced under different constants cannot be compared against each
/// other, so treat any change here as a scoring-model change.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveConfig;

impl AdaptiveConfig {
    /// Lowest selectable question difficulty.
    pub const MIN_DIFFICULTY: f64 = 1.0;
    /// Highest selectable question difficulty.
    pub const MAX_DIFFICULTY: f64 = 10.0;
    /// Difficulty every session starts at.
    pub const INITIAL_DIFFICULTY: f64 = 5.0;
    /// Width of the difficulty band at the start of a session.
    pub const INITIAL_TOLERANCE: f64 = 2.0;
    /// Difficulty increase after a correct answer.
    pub const STEP_UP: f64 = 1.0;
    /// Difficulty decrease after a wrong answer.
    pub const STEP_DOWN: f64 = 0.5;
    /// Hard cap on questions per session.
    pub const MAX_QUESTIONS: usize = 20;
    /// Minimum questions answered before a session may finish.
    pub const MIN_QUESTIONS: usize = 5;
}

/// Compute the difficulty for the next question.
///
/// A correct answer moves difficulty up by [`AdaptiveConfig::STEP_UP`],
/// a wrong one moves it down by [`AdaptiveConfig::STEP_DOWN`], clamped
/// to the valid difficulty range. The up-step being larger than the
/// down-step is intentional policy (sessions lean toward escalating
/// difficulty) and must not be "corrected".
pub fn next_difficulty(current: f64, was_correct: bool) -> f64 {
    let proposed = if was_correct {
        current + AdaptiveConfig::STEP_UP
    } else {
        current - AdaptiveConfig::STEP_DOWN
    };

    proposed.clamp(AdaptiveConfig::MIN_DIFFICULTY, AdaptiveConfig::MAX_DIFFICULTY)
}

/// Acceptable difficulty band half-width for the given question number.
///
/// Starts wide and narrows linearly as the session approaches
/// [`AdaptiveConfig::MAX_QUESTIONS`], so early questions probe broadly
/// and late questions pin the estimate down. `question_number` is
/// 1-based. The result is not clamped; it only reaches 1.0 at the final
/// question.
pub fn tolerance(question_number: usize) -> f64 {
    let progress = question_number as f64 / AdaptiveConfig::MAX_QUESTIONS as f64;
    AdaptiveConfig::INITIAL_TOLERANCE * (1.0 - progress * 0.5)
}
