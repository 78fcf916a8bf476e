//! Ranked improvement hints
//!
//! For each feature the model gives a target for, swap the unit's value for
//! the target and rescore. Swaps that raise the score become hints, best
//! first.

use serde::{Deserialize, Serialize};

use super::Model;
use crate::error::UnitError;
use crate::models::FeatureVector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    /// 1-based position in the ranking
    pub rank: usize,
    pub feature: String,
    pub current_value: f64,
    pub target_value: f64,
    pub current_score: f64,
    pub improved_score: f64,
}

impl Hint {
    pub fn gain(&self) -> f64 {
        self.improved_score - self.current_score
    }

    /// Human readable suggestion for the feature.
    pub fn advice(&self) -> String {
        let direction = if self.target_value < self.current_value {
            "reduce"
        } else {
            "increase"
        };
        let what = match self.feature.as_str() {
            "line_length_avg" | "line_length_max" => "line length",
            "identifiers_avg" | "identifiers_max" => "identifiers per line",
            "identifier_length_avg" | "identifier_length_max" => "identifier length",
            "indentation_avg" | "indentation_max" => "indentation",
            "nesting_depth_avg" | "nesting_depth_max" => "nesting depth",
            "comment_density" => "comment density",
            "blank_line_ratio" => "blank lines between blocks",
            "branches_avg" => "branching",
            "loops_avg" => "loops",
            other => other,
        };
        format!(
            "{direction} {what} ({:.2} -> {:.2})",
            self.current_value, self.target_value
        )
    }
}

/// Compute ranked hints for one vector.
pub fn improvements(model: &Model, vector: &FeatureVector) -> Result<Vec<Hint>, UnitError> {
    model.check_vector(vector)?;
    let current_score = model.score_values(&vector.values)?;

    let mut hints = Vec::new();
    let mut values = vector.values.clone();
    for (i, feature) in model.features.iter().enumerate() {
        let Some(target) = feature.target else {
            continue;
        };
        let original = values[i];
        values[i] = target;
        let improved_score = model.score_values(&values)?;
        values[i] = original;

        if improved_score > current_score {
            hints.push(Hint {
                rank: 0,
                feature: feature.name.clone(),
                current_value: original,
                target_value: target,
                current_score,
                improved_score,
            });
        }
    }

    hints.sort_by(|a, b| {
        b.improved_score
            .total_cmp(&a.improved_score)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    for (i, hint) in hints.iter_mut().enumerate() {
        hint.rank = i + 1;
    }
    Ok(hints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        Model::from_json(
            r#"{"format":"readscope-model","version":1,"schema":"s","link":"linear",
                "intercept":0.0,"range":{"min":-100.0,"max":100.0},
                "features":[
                  {"name":"line_length_avg","weight":-1.0,"target":30.0},
                  {"name":"comment_density","weight":10.0,"target":0.2},
                  {"name":"loops_avg","weight":-5.0,"target":0.0},
                  {"name":"keywords_avg","weight":-1.0}
                ]}"#,
        )
        .unwrap()
    }

    fn vector(values: [f64; 4]) -> FeatureVector {
        FeatureVector {
            schema: "s".into(),
            names: ["line_length_avg", "comment_density", "loops_avg", "keywords_avg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_hints_ranked_by_improved_score() {
        // score = -40 + 0 - 2.5 - 1 = -43.5
        // line length -> 30: -33.5; comments -> 0.2: -41.5; loops -> 0: -41
        let hints = improvements(&model(), &vector([40.0, 0.0, 0.5, 1.0])).unwrap();
        let order: Vec<&str> = hints.iter().map(|h| h.feature.as_str()).collect();
        assert_eq!(order, vec!["line_length_avg", "loops_avg", "comment_density"]);
        assert_eq!(hints.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!((hints[0].gain() - 10.0).abs() < 1e-9);
        assert!(hints[0].advice().starts_with("reduce line length"));
    }

    #[test]
    fn test_no_hint_when_already_better_than_target() {
        let hints = improvements(&model(), &vector([20.0, 0.5, 0.0, 1.0])).unwrap();
        assert!(hints.is_empty());
    }

    #[test]
    fn test_hints_reject_mismatched_vector() {
        let mut v = vector([1.0, 1.0, 1.0, 1.0]);
        v.names.swap(0, 1);
        assert!(matches!(
            improvements(&model(), &v),
            Err(UnitError::FeatureMismatch(_))
        ));
    }
}
