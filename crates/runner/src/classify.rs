//! Outcome classification: detection result + expected outcome -> verdict

use crate::types::{Bucket, DetectionResult, ExpectedOutcome, Verdict};

/// Bucket with the strictly largest count. Ties go to the earlier bucket in
/// [`Bucket::ALL`] order.
pub fn dominant_bucket(result: &DetectionResult) -> Bucket {
    let mut best = Bucket::Passes;
    for bucket in Bucket::ALL {
        if result.count(bucket) > result.count(best) {
            best = bucket;
        }
    }
    best
}

/// Bucket used for the verdict lookup.
///
/// A failed test case counts as detected as soon as one violation is found.
pub fn selected_bucket(result: &DetectionResult, expected: ExpectedOutcome) -> Bucket {
    if expected == ExpectedOutcome::Failed && result.count(Bucket::Violations) > 0 {
        return Bucket::Violations;
    }
    dominant_bucket(result)
}

/// Fixed decision table of expected outcome against selected bucket.
pub fn decide(expected: ExpectedOutcome, bucket: Bucket) -> Verdict {
    use crate::types::Bucket::*;
    use crate::types::ExpectedOutcome as E;

    match (expected, bucket) {
        (E::Passed, Passes) => Verdict::Automated,
        (E::Passed, Violations) => Verdict::Incorrect,
        (E::Passed, Incomplete) => Verdict::SemiAutomated,
        (E::Passed, Inapplicable) => Verdict::Automated,

        (E::Failed, Passes) => Verdict::Incorrect,
        (E::Failed, Violations) => Verdict::Automated,
        (E::Failed, Incomplete) => Verdict::SemiAutomated,
        (E::Failed, Inapplicable) => Verdict::Incorrect,

        (E::Inapplicable, Passes) => Verdict::Automated,
        (E::Inapplicable, Violations) => Verdict::Incorrect,
        (E::Inapplicable, Incomplete) => Verdict::Incorrect,
        (E::Inapplicable, Inapplicable) => Verdict::Automated,
    }
}

pub fn classify(result: &DetectionResult, expected: ExpectedOutcome) -> Verdict {
    decide(expected, selected_bucket(result, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use crate::types::ExpectedOutcome::{Failed, Inapplicable, Passed};

    #[test_case(Passed, Bucket::Passes => Verdict::Automated)]
    #[test_case(Passed, Bucket::Violations => Verdict::Incorrect)]
    #[test_case(Passed, Bucket::Incomplete => Verdict::SemiAutomated)]
    #[test_case(Passed, Bucket::Inapplicable => Verdict::Automated)]
    #[test_case(Failed, Bucket::Passes => Verdict::Incorrect)]
    #[test_case(Failed, Bucket::Violations => Verdict::Automated)]
    #[test_case(Failed, Bucket::Incomplete => Verdict::SemiAutomated)]
    #[test_case(Failed, Bucket::Inapplicable => Verdict::Incorrect)]
    #[test_case(Inapplicable, Bucket::Passes => Verdict::Automated)]
    #[test_case(Inapplicable, Bucket::Violations => Verdict::Incorrect)]
    #[test_case(Inapplicable, Bucket::Incomplete => Verdict::Incorrect)]
    #[test_case(Inapplicable, Bucket::Inapplicable => Verdict::Automated)]
    fn test_decision_table(expected: ExpectedOutcome, bucket: Bucket) -> Verdict {
        decide(expected, bucket)
    }

    #[test_case(1, 1, 1, 1 => Bucket::Passes; "all tied picks passes")]
    #[test_case(0, 2, 2, 0 => Bucket::Violations; "violations beats incomplete on tie")]
    #[test_case(0, 0, 3, 3 => Bucket::Incomplete; "incomplete beats inapplicable on tie")]
    #[test_case(0, 0, 0, 0 => Bucket::Passes; "empty result")]
    #[test_case(1, 0, 0, 4 => Bucket::Inapplicable; "strictly largest wins")]
    fn test_dominant_bucket(p: usize, v: usize, i: usize, n: usize) -> Bucket {
        dominant_bucket(&DetectionResult::from_counts(p, v, i, n))
    }

    #[test]
    fn test_failed_override_beats_dominant_passes() {
        let result = DetectionResult::from_counts(5, 1, 0, 0);
        assert_eq!(dominant_bucket(&result), Bucket::Passes);
        assert_eq!(classify(&result, Failed), Verdict::Automated);
    }

    #[test]
    fn test_override_only_applies_to_failed() {
        let result = DetectionResult::from_counts(5, 1, 0, 0);
        assert_eq!(classify(&result, Passed), Verdict::Automated);
        assert_eq!(classify(&result, Inapplicable), Verdict::Automated);
    }

    #[test]
    fn test_passed_with_dominant_violations_is_incorrect() {
        let result = DetectionResult::from_counts(1, 3, 0, 0);
        assert_eq!(classify(&result, Passed), Verdict::Incorrect);
    }

    #[test]
    fn test_failed_without_violations_falls_back_to_dominant() {
        assert_eq!(classify(&DetectionResult::from_counts(0, 0, 2, 1), Failed), Verdict::SemiAutomated);
        assert_eq!(classify(&DetectionResult::from_counts(0, 0, 0, 1), Failed), Verdict::Incorrect);
    }

    #[test]
    fn test_passed_with_strictly_dominant_passes_is_automated() {
        for passes in 1..6 {
            for other in 0..passes {
                let result = DetectionResult::from_counts(passes, 0, other, other);
                assert_eq!(classify(&result, Passed), Verdict::Automated);
            }
        }
    }
}
