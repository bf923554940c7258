use archetype_studio::archetypes::{compute_alignment, report, ArchetypeProfile};
use archetype_studio::domains::brand::BrandQuestionnaire;

fn vocabulary() -> Vec<String> {
    let mut words: Vec<String> = ArchetypeProfile::ALL
        .iter()
        .flat_map(|archetype| archetype.triggers().iter().map(|t| t.to_string()))
        .collect();
    words.extend(
        ["pricing", "quality", "roadmap", "Freedom", " SAFE "]
            .iter()
            .map(|w| w.to_string()),
    );
    words
}

#[test]
fn scores_grow_monotonically_as_keywords_accumulate() {
    let words = vocabulary();
    let mut previous = compute_alignment(Vec::<String>::new());
    for end in 1..=words.len() {
        let current = compute_alignment(&words[..end]);
        for archetype in ArchetypeProfile::ALL {
            let before = previous.get(archetype);
            let after = current.get(archetype);
            assert!((0.0..=1.0).contains(&after));
            assert!(after >= before, "{archetype} dropped from {before} to {after}");
        }
        previous = current;
    }
    for archetype in ArchetypeProfile::ALL {
        assert_eq!(previous.get(archetype), 1.0);
    }
}

#[test]
fn ties_resolve_to_declaration_order() {
    let score = compute_alignment(["freedom", "instant", "safe", "community"]);
    assert_eq!(score.top(), (ArchetypeProfile::Autonomous, 0.1));
    let ranked: Vec<ArchetypeProfile> = score.ranked().into_iter().map(|(a, _)| a).collect();
    assert_eq!(ranked, ArchetypeProfile::ALL.to_vec());
}

#[test]
fn serialized_scores_are_keyed_by_archetype() {
    let score = compute_alignment(["thrill", "bold"]);
    let value = serde_json::to_value(&score).unwrap();
    assert_eq!(value["impulsive"], 0.2);
    assert_eq!(value["isolated"], 0.0);
    assert_eq!(value.as_object().unwrap().len(), 4);
}

#[test]
fn questionnaire_report_blends_tone_and_keywords() {
    let brand = BrandQuestionnaire {
        mission: "Give makers control of their tools".to_string(),
        keywords: Some("freedom, control, mastery, ownership".to_string()),
        tone: [("direct", 90.0), ("analytical", 80.0), ("playful", 20.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        ..BrandQuestionnaire::default()
    }
    .into_brand_values()
    .unwrap();

    let rows = report(&brand);
    assert_eq!(rows.len(), 4);
    let best = rows
        .iter()
        .max_by(|a, b| a.combined.total_cmp(&b.combined))
        .unwrap();
    assert_eq!(best.archetype, ArchetypeProfile::Autonomous);
    assert_eq!(best.matched_triggers.len(), 4);
    for row in &rows {
        assert!((0.0..=1.0).contains(&row.combined));
        assert!((0.0..=1.0).contains(&row.tone_affinity));
    }
}
