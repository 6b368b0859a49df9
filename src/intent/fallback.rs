use crate::kernel::distress::normalize;

use super::types::{ClassifiedIntent, DetailLevel, IntentKind};

const DESTINATION_PREFIXES: &[&str] = &[
    "take me to ",
    "navigate to ",
    "directions to ",
    "how do i get to ",
    "walk me to ",
    "walk to ",
    "go to ",
];

const NEGATIONS: &[&str] = &["off", "stop", "disable", "end", "deactivate", "done", "quit", "exit"];

/// Local keyword classifier used when the remote classifier is unreachable.
///
/// heuristics, checked in order:
/// - stop-navigation phrases beat "navigate to"
/// - a negation word next to "walking" or "companion" beats the "on" phrases
/// - visual intents last, `Unknown` otherwise
///
/// Needles match whole words, so "ready" never reads as "read".
pub fn classify(transcript: &str) -> ClassifiedIntent {
    let text = transcript.trim().to_lowercase();
    let padded = format!(" {} ", normalize(&text));
    let has = |needles: &[&str]| needles.iter().any(|n| padded.contains(&format!(" {n} ")));
    let negated = has(NEGATIONS) || has(&["turn off", "switch off", "shut off"]);

    if has(&["stop navigation", "stop navigating", "cancel navigation", "end navigation", "cancel the route"]) {
        return ClassifiedIntent::new(IntentKind::StopNavigation);
    }
    if let Some(destination) = destination_after(&text) {
        return ClassifiedIntent::navigate(destination);
    }
    let walking = has(&["walking", "walk mode", "let's walk", "guide me"]);
    if walking && negated {
        return ClassifiedIntent::new(IntentKind::WalkingOff);
    }
    if walking {
        return ClassifiedIntent::new(IntentKind::WalkingOn);
    }
    let companion = has(&["companion", "keep me company", "talk to me", "chatting"]);
    if (companion && negated) || has(&["be quiet", "stop chatting"]) {
        return ClassifiedIntent::new(IntentKind::CompanionOff);
    }
    if companion {
        return ClassifiedIntent::new(IntentKind::CompanionOn);
    }
    if has(&["read", "what does it say", "what does this say", "text", "label", "sign say"]) {
        return ClassifiedIntent::new(IntentKind::ReadText);
    }
    if has(&["safe to", "is it safe", "obstacle", "obstacles", "danger", "can i cross", "clear ahead"]) {
        return ClassifiedIntent::new(IntentKind::SafetyCheck);
    }
    if has(&["where am i", "where are we", "my location"]) {
        return ClassifiedIntent::new(IntentKind::WhereAmI);
    }
    if has(&["describe", "what do you see", "what's in front", "what is in front", "look around", "around me"]) {
        let mut intent = ClassifiedIntent::new(IntentKind::Describe);
        intent.detail_level = Some(if has(&["detail", "detailed", "everything"]) {
            DetailLevel::Detailed
        } else {
            DetailLevel::Brief
        });
        return intent;
    }

    ClassifiedIntent::new(IntentKind::Unknown)
}

fn destination_after(text: &str) -> Option<String> {
    DESTINATION_PREFIXES.iter().find_map(|prefix| {
        let start = text.find(prefix)? + prefix.len();
        let destination = text[start..]
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim();
        (!destination.is_empty()).then(|| destination.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_destination() {
        let intent = classify("Take me to the public library.");
        assert_eq!(intent.kind, IntentKind::Navigate);
        assert_eq!(intent.destination.as_deref(), Some("the public library"));
    }

    #[test]
    fn navigate_without_destination_is_not_navigation() {
        assert_ne!(classify("take me to").kind, IntentKind::Navigate);
    }

    #[test]
    fn stop_beats_navigate() {
        assert_eq!(classify("stop navigation").kind, IntentKind::StopNavigation);
    }

    #[test]
    fn off_beats_on() {
        assert_eq!(classify("walking mode off").kind, IntentKind::WalkingOff);
        assert_eq!(classify("disable walking mode").kind, IntentKind::WalkingOff);
        assert_eq!(classify("I'm done walking").kind, IntentKind::WalkingOff);
        assert_eq!(classify("start walking").kind, IntentKind::WalkingOn);
        assert_eq!(classify("companion mode off").kind, IntentKind::CompanionOff);
        assert_eq!(classify("turn off companion mode").kind, IntentKind::CompanionOff);
        assert_eq!(classify("stop companion mode").kind, IntentKind::CompanionOff);
        assert_eq!(classify("disable companion").kind, IntentKind::CompanionOff);
        assert_eq!(classify("companion mode on").kind, IntentKind::CompanionOn);
        assert_eq!(classify("turn on companion mode").kind, IntentKind::CompanionOn);
    }

    #[test]
    fn needles_match_whole_words() {
        assert_eq!(classify("I'm ready").kind, IntentKind::Unknown);
        assert_eq!(classify("already there?").kind, IntentKind::Unknown);
        assert_eq!(classify("give me some context").kind, IntentKind::Unknown);
        assert_eq!(classify("read this for me").kind, IntentKind::ReadText);
    }

    #[test]
    fn visual_group() {
        assert_eq!(classify("what does this sign say").kind, IntentKind::ReadText);
        assert_eq!(classify("is it safe to cross").kind, IntentKind::SafetyCheck);
        assert_eq!(classify("where am I").kind, IntentKind::WhereAmI);
        let describe = classify("describe everything in detail");
        assert_eq!(describe.kind, IntentKind::Describe);
        assert_eq!(describe.detail_level, Some(DetailLevel::Detailed));
        assert_eq!(classify("tell me a joke").kind, IntentKind::Unknown);
    }
}
