// End-to-end pipeline test: assemble a multi-group reference graph from a
// template and a JSON rule table, align sequences against it, and drive
// selection, formatting, and evaluation through the public API only.

use gamut::{
    Alignment, BuildOptions, Error, GroupTemplate, MutationRules, OutputStyle, ReferenceGraph,
    SelectPolicy,
};

fn stems() -> Vec<String> {
    ["ut", "re", "mi", "fa", "sol", "la"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Three overlapping six-value groups over 0..=13, alternating kinds, with
/// mutation edges at every overlap in both directions.
fn reference() -> ReferenceGraph<i32> {
    let template = GroupTemplate::new(
        vec![
            (0, 1, "hard".to_string()),
            (4, 2, "natural".to_string()),
            (8, 3, "hard".to_string()),
        ],
        vec![1; 5],
        stems(),
    )
    .unwrap();

    let mut reference = ReferenceGraph::new();
    for anchor in [0, 4, 8] {
        reference.add_group(template.build(&anchor).unwrap()).unwrap();
    }
    let rules = MutationRules::from_json(
        r#"
        {
            "hard": {
                "up":   { "natural": [{"source_rank": 5, "target_rank": 2}] },
                "down": { "natural": [{"source_rank": 2, "target_rank": 5}] }
            },
            "natural": {
                "up":   { "hard": [{"source_rank": 5, "target_rank": 2}] },
                "down": { "hard": [{"source_rank": 2, "target_rank": 5}] }
            }
        }"#,
    )
    .unwrap();
    reference.add_mutation_rules(&rules, 2.0).unwrap();
    reference
}

#[test]
fn full_ascent_aligns_and_formats() {
    let reference = reference();
    let sequence: Vec<i32> = (0..=13).collect();
    let mut alignment = Alignment::new(&reference, &sequence, BuildOptions::default()).unwrap();

    let labels = alignment.output(&OutputStyle::Name).unwrap();
    assert_eq!(labels.len(), sequence.len());
    // The run starts before the first overlap and ends after the last, so
    // the outer labels are unambiguous.
    assert_eq!(labels[0], "ut1");
    assert_eq!(labels[13], "la3");
}

#[test]
fn ranked_alternatives_agree_with_step_records() {
    let reference = reference();
    let sequence: Vec<i32> = (2..=7).collect();
    let mut alignment = Alignment::new(&reference, &sequence, BuildOptions::default()).unwrap();

    let best = alignment.select(&SelectPolicy::Best).unwrap().to_vec();
    let steps = alignment.steps().unwrap();
    assert_eq!(steps.len(), sequence.len());
    // Rank 0 of every step record is the node the best path visits there.
    for (step, &node) in steps.iter().zip(&best) {
        assert_eq!(step.candidates[0], node);
    }
}

#[test]
fn evaluation_closes_the_loop() {
    let reference = reference();
    let sequence = vec![0, 1, 2, 3];
    let mut alignment = Alignment::new(&reference, &sequence, BuildOptions::default()).unwrap();

    // Ground truth with one bracketed label and one missing marker.
    let targets = [Some("ut"), Some("[re]"), Some("?"), Some("sol")];
    let counts = alignment.evaluate(&targets, &OutputStyle::Syllable).unwrap();
    assert_eq!(counts.correct, 2);
    assert_eq!(counts.missing, 1);
    assert_eq!(counts.incorrect, 1);
    assert_eq!(counts.total(), 4);
}

#[test]
fn one_alignment_instance_serves_many_sequences() {
    let reference = reference();
    let mut alignment =
        Alignment::new(&reference, &[0, 1, 2], BuildOptions::default()).unwrap();
    assert_eq!(
        alignment.output(&OutputStyle::Syllable).unwrap(),
        vec!["ut", "re", "mi"]
    );

    alignment.realign(&[8, 9, 10]).unwrap();
    let labels = alignment.output(&OutputStyle::Name).unwrap();
    assert_eq!(labels, vec!["ut3", "re3", "mi3"]);
}

#[test]
fn unparseable_sequence_reports_the_offending_index() {
    let reference = reference();
    let err = Alignment::new(&reference, &[0, 1, 99], BuildOptions::default()).unwrap_err();
    assert_eq!(err.sequence_index(), Some(2));

    let err = Alignment::new(&reference, &[99], BuildOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NoMatch { index: 0 }));
}
