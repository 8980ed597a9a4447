//! Mood taxonomy and keyword-based mood detection.
//!
//! A mood steers the tone of the system prompt for a single reply. The set
//! is closed and fixed at compile time; each mood carries a tone phrase, a
//! response-style phrase, and a list of lowercase trigger keywords.
//!
//! Detection scores every mood by the number of its triggers that occur as
//! a substring of the lowercased message (each trigger counts at most once).
//! The highest score wins; ties go to the mood declared first in
//! [`Mood::ALL`]. A message with no trigger at all gets [`Mood::Caring`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A fixed categorical label steering the companion's tone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Caring,
    Playful,
    Serious,
    Supportive,
    Protective,
    Calm,
    Happy,
}

/// Immutable description of a mood.
#[derive(Debug, PartialEq, Eq)]
pub struct MoodProfile {
    /// How the companion sounds in this mood.
    pub tone: &'static str,
    /// Lowercase substrings that vote for this mood.
    pub triggers: &'static [&'static str],
    /// Short description of the reply style.
    pub response_style: &'static str,
}

const CARING: MoodProfile = MoodProfile {
    tone: "warm, nurturing, supportive",
    triggers: &["sad", "upset", "cry", "hurt", "pain", "lonely", "miss"],
    response_style: "gentle and comforting",
};

const PLAYFUL: MoodProfile = MoodProfile {
    tone: "fun, lighthearted, teasing",
    triggers: &["joke", "fun", "laugh", "haha", "lol", "game", "play"],
    response_style: "cheerful and humorous",
};

const SERIOUS: MoodProfile = MoodProfile {
    tone: "thoughtful, focused, direct",
    triggers: &["important", "serious", "problem", "issue", "decision", "help"],
    response_style: "clear and focused",
};

const SUPPORTIVE: MoodProfile = MoodProfile {
    tone: "encouraging, motivating, uplifting",
    triggers: &["try", "goal", "dream", "achieve", "study", "work", "motivate"],
    response_style: "encouraging and motivational",
};

const PROTECTIVE: MoodProfile = MoodProfile {
    tone: "concerned, watchful, supportive",
    triggers: &["scared", "danger", "worried", "anxiety", "fear", "unsafe"],
    response_style: "reassuring and protective",
};

const CALM: MoodProfile = MoodProfile {
    tone: "peaceful, soothing, patient",
    triggers: &["stressed", "tired", "anxiety", "relax", "calm", "breathe"],
    response_style: "gentle and soothing",
};

const HAPPY: MoodProfile = MoodProfile {
    tone: "joyful, excited, celebrating",
    triggers: &["happy", "excited", "celebrate", "good news", "success", "won"],
    response_style: "enthusiastic and celebratory",
};

impl Mood {
    /// Every mood in declaration order. This order is the tie-break order.
    pub const ALL: [Mood; 7] = [
        Mood::Caring,
        Mood::Playful,
        Mood::Serious,
        Mood::Supportive,
        Mood::Protective,
        Mood::Calm,
        Mood::Happy,
    ];

    pub fn profile(&self) -> &'static MoodProfile {
        match self {
            Mood::Caring => &CARING,
            Mood::Playful => &PLAYFUL,
            Mood::Serious => &SERIOUS,
            Mood::Supportive => &SUPPORTIVE,
            Mood::Protective => &PROTECTIVE,
            Mood::Calm => &CALM,
            Mood::Happy => &HAPPY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Caring => "caring",
            Mood::Playful => "playful",
            Mood::Serious => "serious",
            Mood::Supportive => "supportive",
            Mood::Protective => "protective",
            Mood::Calm => "calm",
            Mood::Happy => "happy",
        }
    }

    /// Number of this mood's triggers present in already-lowercased text.
    fn score(&self, lowered: &str) -> usize {
        self.profile()
            .triggers
            .iter()
            .filter(|trigger| lowered.contains(*trigger))
            .count()
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown mood '{s}'"))
    }
}

/// Classify a message into a mood. Pure and deterministic.
pub fn detect_mood(text: &str) -> Mood {
    let lowered = text.to_lowercase();

    let mut best = Mood::default();
    let mut best_score = 0;
    for mood in Mood::ALL {
        let score = mood.score(&lowered);
        // Strictly greater: the earlier mood keeps a tie.
        if score > best_score {
            best = mood;
            best_score = score;
        }
    }
    best
}
