//! Comparison of a score against a condition's comparator and threshold.

use crate::schema::{Comparator, Threshold};
use crate::signals::SignalScore;

fn threshold_number(threshold: &Threshold) -> Option<f64> {
    match threshold {
        Threshold::Number(n) => Some(*n),
        Threshold::Text(s) => s.trim().parse().ok(),
    }
}

fn score_number(score: &SignalScore) -> Option<f64> {
    match score {
        SignalScore::Number(n) => Some(*n),
        SignalScore::Text(s) => s.trim().parse().ok(),
        SignalScore::Boolean(_) => None,
    }
}

fn equals(score: &SignalScore, threshold: &Threshold) -> Result<bool, String> {
    match (score, threshold) {
        (SignalScore::Number(n), _) => threshold_number(threshold)
            .map(|t| *n == t)
            .ok_or_else(|| format!("cannot compare number {n} with {threshold:?}")),
        (SignalScore::Text(s), Threshold::Text(t)) => Ok(s == t),
        (SignalScore::Text(s), Threshold::Number(t)) => score_number(score)
            .map(|n| n == *t)
            .ok_or_else(|| format!("cannot compare text '{s}' with number {t}")),
        (SignalScore::Boolean(b), Threshold::Text(t)) => t
            .parse::<bool>()
            .map(|t| *b == t)
            .map_err(|_| format!("cannot compare boolean with '{t}'")),
        (SignalScore::Boolean(_), Threshold::Number(t)) => {
            Err(format!("cannot compare boolean with number {t}"))
        }
    }
}

/// Whether `score` satisfies the comparison. Type mismatches are errors.
///
/// Without a comparator only boolean scores are meaningful: they pass when true.
pub(crate) fn score_passes(
    score: &SignalScore,
    comparator: Option<Comparator>,
    threshold: Option<&Threshold>,
) -> Result<bool, String> {
    let Some(comparator) = comparator else {
        return match score {
            SignalScore::Boolean(b) => Ok(*b),
            other => Err(format!("score {other} needs a comparator")),
        };
    };

    match comparator {
        Comparator::IsUnavailable | Comparator::IsNotProvided => Ok(false),
        Comparator::Equals | Comparator::NotEqualTo => {
            let threshold = threshold.ok_or("comparator requires a threshold")?;
            let eq = equals(score, threshold)?;
            Ok(if comparator == Comparator::Equals { eq } else { !eq })
        }
        _ => {
            let threshold = threshold.ok_or("comparator requires a threshold")?;
            let (Some(n), Some(t)) = (score_number(score), threshold_number(threshold)) else {
                return Err(format!("cannot order {score} against {threshold:?}"));
            };
            Ok(match comparator {
                Comparator::LessThan => n < t,
                Comparator::LessThanOrEquals => n <= t,
                Comparator::GreaterThan => n > t,
                _ => n >= t,
            })
        }
    }
}
