//! Static emotion tables per archetype and a lexicon-based detector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::archetypes::ArchetypeProfile;
use crate::text::keyword_set;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Pride,
    Curiosity,
    Anticipation,
    Joy,
    Surprise,
    Trust,
    Relief,
    Fear,
    Belonging,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Pride,
        Emotion::Curiosity,
        Emotion::Anticipation,
        Emotion::Joy,
        Emotion::Surprise,
        Emotion::Trust,
        Emotion::Relief,
        Emotion::Fear,
        Emotion::Belonging,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Pride => "pride",
            Self::Curiosity => "curiosity",
            Self::Anticipation => "anticipation",
            Self::Joy => "joy",
            Self::Surprise => "surprise",
            Self::Trust => "trust",
            Self::Relief => "relief",
            Self::Fear => "fear",
            Self::Belonging => "belonging",
        }
    }

    pub fn cues(&self) -> &'static [&'static str] {
        match self {
            Self::Pride => &["achieve", "master", "expert", "proud", "lead", "ownership", "earned"],
            Self::Curiosity => &["discover", "learn", "explore", "secret", "wonder", "curious", "insight"],
            Self::Anticipation => &["soon", "launch", "coming", "limited", "countdown", "today", "hurry"],
            Self::Joy => &["fun", "love", "delight", "happy", "enjoy", "celebrate", "exciting"],
            Self::Surprise => &["new", "unexpected", "surprise", "first", "reveal", "bold"],
            Self::Trust => &["trusted", "proven", "reliable", "certified", "honest", "guaranteed"],
            Self::Relief => &["easy", "simple", "effortless", "safe", "secure", "risk-free", "worry"],
            Self::Fear => &["miss", "lose", "risk", "danger", "mistake", "afraid", "threat"],
            Self::Belonging => &["together", "community", "family", "join", "belong", "friends", "support"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmotionalTrigger {
    pub emotion: Emotion,
    pub intensity: f64,
}

const fn trigger(emotion: Emotion, intensity: f64) -> EmotionalTrigger {
    EmotionalTrigger { emotion, intensity }
}

const AUTONOMOUS_TRIGGERS: [EmotionalTrigger; 3] = [
    trigger(Emotion::Pride, 0.8),
    trigger(Emotion::Curiosity, 0.7),
    trigger(Emotion::Trust, 0.5),
];
const IMPULSIVE_TRIGGERS: [EmotionalTrigger; 3] = [
    trigger(Emotion::Anticipation, 0.9),
    trigger(Emotion::Joy, 0.8),
    trigger(Emotion::Surprise, 0.7),
];
const AVOIDANT_TRIGGERS: [EmotionalTrigger; 3] = [
    trigger(Emotion::Relief, 0.9),
    trigger(Emotion::Trust, 0.8),
    trigger(Emotion::Fear, 0.4),
];
const ISOLATED_TRIGGERS: [EmotionalTrigger; 3] = [
    trigger(Emotion::Belonging, 0.9),
    trigger(Emotion::Trust, 0.7),
    trigger(Emotion::Joy, 0.5),
];

pub fn triggers_for(archetype: ArchetypeProfile) -> &'static [EmotionalTrigger] {
    match archetype {
        ArchetypeProfile::Autonomous => &AUTONOMOUS_TRIGGERS,
        ArchetypeProfile::Impulsive => &IMPULSIVE_TRIGGERS,
        ArchetypeProfile::Avoidant => &AVOIDANT_TRIGGERS,
        ArchetypeProfile::Isolated => &ISOLATED_TRIGGERS,
    }
}

pub fn power_words(archetype: ArchetypeProfile) -> &'static [&'static str] {
    match archetype {
        ArchetypeProfile::Autonomous => &["your way", "in control", "on your terms", "unlock"],
        ArchetypeProfile::Impulsive => &["today only", "just dropped", "don't wait", "instantly"],
        ArchetypeProfile::Avoidant => &["no risk", "backed by", "step by step", "peace of mind"],
        ArchetypeProfile::Isolated => &["you're not alone", "join us", "made for you", "we've got you"],
    }
}

/// Emotions whose cue words appear in `text`, with intensity
/// `0.5 + 0.1 * (distinct cues - 1)` capped at 1.
pub fn detect(text: &str) -> BTreeMap<Emotion, f64> {
    let words = keyword_set(text);
    let mut detected = BTreeMap::new();
    for emotion in Emotion::ALL {
        let hits = emotion
            .cues()
            .iter()
            .filter(|cue| words.contains(**cue))
            .count();
        if hits > 0 {
            let intensity = (0.5 + 0.1 * (hits - 1) as f64).min(1.0);
            detected.insert(emotion, intensity);
        }
    }
    detected
}

/// Fraction of the archetype's trigger emotions present in `text`.
pub fn resonance(text: &str, archetype: ArchetypeProfile) -> f64 {
    let triggers = triggers_for(archetype);
    if triggers.is_empty() {
        return 0.0;
    }
    let detected = detect(text);
    let hits = triggers
        .iter()
        .filter(|trigger| detected.contains_key(&trigger.emotion))
        .count();
    hits as f64 / triggers.len() as f64
}
