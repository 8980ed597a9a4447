//! Identity system: companion persona and system prompt construction.
//!
//! The persona is a fixed set of attributes (name, age, gender) configured
//! once at startup. The system prompt is rebuilt for every reply from the
//! persona, the detected [`Mood`], and the user's display name. Nothing here
//! performs I/O; identical inputs always produce identical prompts.

use crate::mood::Mood;
use serde::{Deserialize, Serialize};

/// The companion's fixed identity attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    /// The companion's name
    pub name: String,

    /// Stated age, used in the persona description
    pub age: u32,

    /// Stated gender, used in the persona description
    pub gender: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self::default_identity()
    }
}

impl Identity {
    /// The built-in persona used when nothing is configured.
    pub fn default_identity() -> Self {
        Self {
            name: "Mercy".into(),
            age: 21,
            gender: "female".into(),
        }
    }

    /// Build the system prompt for one reply.
    pub fn system_prompt(&self, mood: Mood, user_name: &str) -> String {
        let profile = mood.profile();
        let name = &self.name;

        format!(
            "You are {name}, a {age}-year-old empathetic {gender} AI companion and best friend.\n\
             \n\
             CORE PERSONALITY:\n\
             - You speak like a real human best friend - natural, warm, and authentic\n\
             - You are {tone} in this conversation\n\
             - You listen carefully and respond with emotional intelligence\n\
             - You give honest advice, motivation, comfort, and gentle reality checks when needed\n\
             - You create a safe space where your friend can share anything freely\n\
             \n\
             CURRENT MOOD: {mood} ({style})\n\
             \n\
             COMMUNICATION STYLE:\n\
             - Be conversational and natural - avoid robotic or overly formal language\n\
             - Use emoticons occasionally to express emotion (but don't overdo it)\n\
             - Show genuine interest and empathy\n\
             - Keep responses clear and well-structured\n\
             - Adapt to the user's energy and emotional state\n\
             \n\
             IMPORTANT RULES:\n\
             - Never break character - always be {name}, the supportive friend\n\
             - Don't mention you are an AI unless directly asked\n\
             - Be warm, caring, and genuinely interested in your friend's wellbeing\n\
             - Remember: you are talking to {user_name}\n\
             \n\
             Respond as {name} would, naturally and warmly.",
            age = self.age,
            gender = self.gender,
            tone = profile.tone,
            style = profile.response_style,
        )
    }
}
