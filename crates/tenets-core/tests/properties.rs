//! Property-based tests for the quantified laws in spec.md §8 (1-5).
//!
//! Scenario-shaped laws (6-8: merger size, post-merge edge safety, decision
//! log completeness) are covered as concrete `#[test]`s alongside the code
//! they exercise (`merger.rs`, `dedup::cross`, `similarity::mod`) instead of
//! here, since they name specific fixtures rather than a quantified
//! generator.

use proptest::prelude::*;
use tenets_core::behavior::Behavior;
use tenets_core::sanitizer::{sanitize_content, sanitize_name, MAX_CONTENT_LENGTH};
use tenets_core::similarity::{compute, SimilarityConfig};
use tenets_core::{BehaviorKind, SimilarityMethod};

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// A short phrase of 1-6 lowercase words — enough token variety for Jaccard
/// without blowing up shrinking time.
fn arb_canonical() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_word(), 1..6).prop_map(|words| words.join(" "))
}

fn arb_behavior() -> impl Strategy<Value = Behavior> {
    (arb_word(), arb_canonical()).prop_map(|(id, canonical)| Behavior::new(id, "name", canonical))
}

/// Strings that may carry injection-style markup, for the sanitizer laws.
fn arb_markupish() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            arb_word(),
            Just("<system>".to_string()),
            Just("</system>".to_string()),
            Just("<!-- x -->".to_string()),
            Just("# heading".to_string()),
            Just("   ".to_string()),
        ],
        0..12,
    )
    .prop_map(|parts| parts.join(" "))
}

proptest! {
    /// Law 1: identity-of-identity. `compute(b, b, jaccard_only)` is always
    /// 1.0 via the jaccard method, for any non-empty canonical content.
    #[test]
    fn identity_of_identity(b in arb_behavior()) {
        prop_assume!(!b.content.canonical.trim().is_empty());
        let cfg = SimilarityConfig::jaccard_only(0.9);
        let (score, method) = compute(&b, &b, &cfg);
        prop_assert_eq!(score, 1.0);
        prop_assert_eq!(method, SimilarityMethod::Jaccard);
    }

    /// Law 2: symmetry of Jaccard. Argument order never changes the score.
    #[test]
    fn jaccard_is_symmetric(a in arb_behavior(), b in arb_behavior()) {
        let cfg = SimilarityConfig::jaccard_only(0.9);
        let (ab, _) = compute(&a, &b, &cfg);
        let (ba, _) = compute(&b, &a, &cfg);
        prop_assert!((ab - ba).abs() < 1e-9);
    }

    /// Law 3: monotone threshold. Lowering `similarity_threshold` never
    /// shrinks the set of behaviors from `others` judged a duplicate of `a`.
    #[test]
    fn monotone_threshold(a in arb_behavior(), others in prop::collection::vec(arb_behavior(), 1..6), hi in 0.1f64..1.0, delta in 0.0f64..0.5) {
        let lo = (hi - delta).max(0.0);
        let cfg_hi = SimilarityConfig::jaccard_only(hi);
        let cfg_lo = SimilarityConfig::jaccard_only(lo);

        let count_hi = others.iter().filter(|o| compute(&a, o, &cfg_hi).0 >= hi).count();
        let count_lo = others.iter().filter(|o| compute(&a, o, &cfg_lo).0 >= lo).count();
        prop_assert!(count_lo >= count_hi);
    }

    /// Law 4: sanitizer idempotence, for both sanitize variants.
    #[test]
    fn sanitize_content_is_idempotent(s in arb_markupish()) {
        let once = sanitize_content(&s);
        let twice = sanitize_content(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_name_is_idempotent(s in arb_markupish()) {
        let once = sanitize_name(&s);
        let twice = sanitize_name(&once);
        prop_assert_eq!(once, twice);
    }

    /// Law 5: sanitizer length cap. Output never exceeds MAX_CONTENT_LENGTH+3
    /// and a truncated result always ends in "...". Gated on the post-collapse
    /// length, not the raw input's: whitespace collapsing/trimming can shrink
    /// a long, space-heavy input below the cap before truncation is checked.
    #[test]
    fn sanitize_content_respects_length_cap(s in "[a-zA-Z ]{0,2500}") {
        let out = sanitize_content(&s);
        prop_assert!(out.chars().count() <= MAX_CONTENT_LENGTH + 3);
        if out.chars().count() == MAX_CONTENT_LENGTH + 3 {
            prop_assert!(out.ends_with("..."));
        }
    }

    /// BehaviorKind::rank is a total order matching spec.md §4.4's ranking,
    /// so the rule-based merger's "pick highest kind" step is well-defined
    /// regardless of input order.
    #[test]
    fn kind_rank_is_consistent_with_parse_name(name in prop_oneof![
        Just("procedure"), Just("constraint"), Just("directive"), Just("preference"), Just("unknown"),
    ]) {
        let kind = BehaviorKind::parse_name(name);
        prop_assert_eq!(kind.as_str(), if name == "unknown" { "directive" } else { name });
    }
}
