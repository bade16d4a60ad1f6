//! Prompt composition for the music model.

use std::fmt;
use std::str::FromStr;

use crate::models::Mood;

/// Static production parameters for one mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodProfile {
    pub descriptors: [&'static str; 4],
    pub tempo: &'static str,
    pub intensity: &'static str,
}

const DARK: MoodProfile = MoodProfile {
    descriptors: ["ominous", "foreboding", "shadowy", "malevolent"],
    tempo: "very slow (50-60 BPM)",
    intensity: "intense and dramatic",
};

const EERIE: MoodProfile = MoodProfile {
    descriptors: ["unsettling", "ghostly", "ethereal", "haunting"],
    tempo: "slow (60-70 BPM)",
    intensity: "subtle and creeping",
};

const MELANCHOLIC: MoodProfile = MoodProfile {
    descriptors: ["sorrowful", "wistful", "nostalgic", "bittersweet"],
    tempo: "slow to medium (70-80 BPM)",
    intensity: "gentle and emotional",
};

impl Mood {
    pub fn profile(&self) -> &'static MoodProfile {
        match self {
            Mood::Dark => &DARK,
            Mood::Eerie => &EERIE,
            Mood::Melancholic => &MELANCHOLIC,
        }
    }
}

/// Build the generation prompt. Identical input always yields identical output.
pub fn compose(text: &str, mood: Mood) -> String {
    let profile = mood.profile();

    format!(
        "Eulogy-style dark ambient music inspired by: \"{text}\"\n\
         \n\
         {descriptors} atmosphere.\n\
         Haunting synthesizers with ethereal vocal-like tones.\n\
         Heavy reverb, no drums, no percussion, pure atmospheric synthesis.\n\
         Tempo: {tempo}.\n\
         Intensity: {intensity} emotional progression.\n\
         Style: dark ambient, cinematic, haunting.",
        text = text.trim(),
        descriptors = profile.descriptors.join(", "),
        tempo = profile.tempo,
        intensity = profile.intensity,
    )
}

pub const MIN_DURATION_SECS: u32 = 15;
pub const MAX_DURATION_SECS: u32 = 180;
/// Longest piece the music model accepts.
pub const MAX_GENERATION_SECS: u32 = 300;

/// How long the generated piece should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPolicy {
    /// Same length for every request.
    Fixed { seconds: u32 },
    /// Proportional to word count, clamped to 15..=180 seconds.
    PerWord { seconds_per_word: u32 },
}

impl Default for DurationPolicy {
    fn default() -> Self {
        DurationPolicy::Fixed { seconds: 30 }
    }
}

impl DurationPolicy {
    pub fn duration_for(&self, text: &str) -> u32 {
        match *self {
            DurationPolicy::Fixed { seconds } => seconds,
            DurationPolicy::PerWord { seconds_per_word } => {
                let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
                words
                    .saturating_mul(seconds_per_word)
                    .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
            }
        }
    }
}

impl fmt::Display for DurationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationPolicy::Fixed { seconds } => write!(f, "fixed:{}", seconds),
            DurationPolicy::PerWord { seconds_per_word } => write!(f, "words:{}", seconds_per_word),
        }
    }
}

/// Parses `fixed:<seconds>` or `words:<seconds-per-word>`.
impl FromStr for DurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid duration policy '{}'", s))?;
        let value: u32 = value
            .trim()
            .parse()
            .map_err(|_| format!("Invalid duration policy value '{}'", value))?;
        if value == 0 {
            return Err(format!("Duration policy value must be positive: '{}'", s));
        }

        match kind.trim() {
            "fixed" if value > MAX_GENERATION_SECS => Err(format!(
                "Fixed duration must be at most {} seconds: '{}'",
                MAX_GENERATION_SECS, s
            )),
            "fixed" => Ok(DurationPolicy::Fixed { seconds: value }),
            "words" => Ok(DurationPolicy::PerWord {
                seconds_per_word: value,
            }),
            other => Err(format!("Unknown duration policy '{}'", other)),
        }
    }
}
