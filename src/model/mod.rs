//! Readability model evaluation
//!
//! A model is an ordered list of `(feature, weight)` pairs plus an intercept
//! and a link function mapping the linear combination onto a score range.
//! Models are plain JSON documents (see `models/readability_model.json`):
//!
//! ```json
//! {"format":"readscope-model","version":1,"schema":"readscope.features.v1",
//!  "link":"logistic","intercept":1.4,"range":{"min":0.0,"max":1.0},
//!  "bands":{"low":0.33,"high":0.66},
//!  "features":[{"name":"line_length_avg","weight":-0.03,"target":32.0}]}
//! ```
//!
//! Scoring is a pure function of the model and the vector.

pub mod improve;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReadscopeError, Result, UnitError};
use crate::models::{FeatureVector, ModelInfo, RatingBand};

pub use improve::{improvements, Hint};

/// Format tag every model document must carry.
pub const MODEL_FORMAT: &str = "readscope-model";

/// Highest model format version this build understands.
pub const MODEL_VERSION: u32 = 1;

/// Well-known file name of a model resource.
pub const MODEL_FILE_NAME: &str = "readability_model";

/// Default model shipped with the binary.
const DEFAULT_MODEL_JSON: &str = include_str!("../../models/readability_model.json");

/// Maps the linear combination `z` onto the score range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// `min + (max - min) * sigmoid(z)`
    Logistic,
    /// `min + (max - min) * (1 - sigmoid(z))`
    InvertedLogistic,
    /// `clamp(z, min, max)`
    Linear,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Link::Logistic => "logistic",
            Link::InvertedLogistic => "inverted_logistic",
            Link::Linear => "linear",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Band thresholds as fractions of the score range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub low: f64,
    pub high: f64,
}

impl Default for Bands {
    fn default() -> Self {
        Self {
            low: 0.33,
            high: 0.66,
        }
    }
}

/// One weighted feature of the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub name: String,
    pub weight: f64,
    /// Value typical of well readable code, used for improvement hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
}

/// A validated readability model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub format: String,
    pub version: u32,
    pub schema: String,
    pub link: Link,
    pub intercept: f64,
    #[serde(default)]
    pub range: ScoreRange,
    #[serde(default)]
    pub bands: Bands,
    pub features: Vec<FeatureWeight>,
    /// Where the model was loaded from
    #[serde(skip)]
    source: String,
}

impl Model {
    /// Load and validate a model file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReadscopeError::model_load(path, e.to_string()))?;
        let mut model = Self::from_json(&content)
            .map_err(|reason| ReadscopeError::model_load(path, reason))?;
        model.source = path.display().to_string();
        debug!("Loaded model {} ({} features)", model.source, model.features.len());
        Ok(model)
    }

    /// Parse and validate a model document.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let model: Model = serde_json::from_str(json).map_err(|e| e.to_string())?;
        model.validate()?;
        Ok(model)
    }

    /// The model compiled into the binary.
    pub fn embedded_default() -> Result<Self> {
        let mut model = Self::from_json(DEFAULT_MODEL_JSON)
            .map_err(|reason| ReadscopeError::model_load("<embedded>", reason))?;
        model.source = "<embedded>".to_string();
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.format != MODEL_FORMAT {
            return Err(format!(
                "unknown model format '{}', expected '{MODEL_FORMAT}'",
                self.format
            ));
        }
        if self.version == 0 || self.version > MODEL_VERSION {
            return Err(format!("unsupported model version {}", self.version));
        }
        if self.schema.trim().is_empty() {
            return Err("model schema id is empty".into());
        }
        if self.features.is_empty() {
            return Err("model declares no features".into());
        }
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".into());
        }
        let ScoreRange { min, max } = self.range;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(format!("invalid score range [{min}, {max}]"));
        }
        let Bands { low, high } = self.bands;
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
            return Err(format!("invalid band thresholds low={low} high={high}"));
        }

        let mut seen = HashSet::new();
        for f in &self.features {
            if !seen.insert(f.name.as_str()) {
                return Err(format!("duplicate feature '{}'", f.name));
            }
            if !f.weight.is_finite() {
                return Err(format!("weight of '{}' is not finite", f.name));
            }
            if f.target.is_some_and(|t| !t.is_finite()) {
                return Err(format!("target of '{}' is not finite", f.name));
            }
        }
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Feature names in model order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name.as_str())
    }

    /// Fail unless this model was built for the `schema` an extractor produces.
    pub fn check_schema(&self, schema: &str, names: &[&str]) -> Result<()> {
        if self.schema != schema {
            return Err(ReadscopeError::model_load(
                &self.source,
                format!(
                    "model schema '{}' does not match extractor schema '{schema}'",
                    self.schema
                ),
            ));
        }
        if !self.feature_names().eq(names.iter().copied()) {
            return Err(ReadscopeError::model_load(
                &self.source,
                "model feature list does not match the extractor".to_string(),
            ));
        }
        Ok(())
    }

    /// Score a feature vector.
    pub fn score(&self, vector: &FeatureVector) -> std::result::Result<f64, UnitError> {
        self.check_vector(vector)?;
        self.score_values(&vector.values)
    }

    pub(crate) fn check_vector(&self, vector: &FeatureVector) -> std::result::Result<(), UnitError> {
        if vector.schema != self.schema {
            return Err(UnitError::FeatureMismatch(format!(
                "vector schema '{}' does not match model schema '{}'",
                vector.schema, self.schema
            )));
        }
        if vector.values.len() != self.features.len() || vector.names.len() != self.features.len() {
            return Err(UnitError::FeatureMismatch(format!(
                "expected {} features, got {}",
                self.features.len(),
                vector.values.len()
            )));
        }
        for (i, (expected, actual)) in self.features.iter().zip(&vector.names).enumerate() {
            if expected.name != *actual {
                return Err(UnitError::FeatureMismatch(format!(
                    "feature {i} is '{actual}', model expects '{}'",
                    expected.name
                )));
            }
        }
        if let Some((name, _)) = vector.iter().find(|(_, v)| !v.is_finite()) {
            return Err(UnitError::FeatureMismatch(format!("feature '{name}' is not finite")));
        }
        Ok(())
    }

    /// Score raw values already known to line up with the model.
    pub(crate) fn score_values(&self, values: &[f64]) -> std::result::Result<f64, UnitError> {
        let z = self.intercept
            + self
                .features
                .iter()
                .zip(values)
                .map(|(f, x)| f.weight * x)
                .sum::<f64>();
        if z.is_nan() {
            return Err(UnitError::FeatureMismatch("linear combination is NaN".into()));
        }

        let ScoreRange { min, max } = self.range;
        let score = match self.link {
            Link::Logistic => min + (max - min) * sigmoid(z),
            Link::InvertedLogistic => min + (max - min) * (1.0 - sigmoid(z)),
            Link::Linear => z.clamp(min, max),
        };
        Ok(score.clamp(min, max))
    }

    /// Assign a rating band to a score.
    pub fn band(&self, score: f64) -> RatingBand {
        let ScoreRange { min, max } = self.range;
        let normalized = (score - min) / (max - min);
        if normalized < self.bands.low {
            RatingBand::Low
        } else if normalized > self.bands.high {
            RatingBand::High
        } else {
            RatingBand::Medium
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            schema: self.schema.clone(),
            version: self.version,
            link: self.link.to_string(),
            range_min: self.range.min,
            range_max: self.range.max,
            source: self.source.clone(),
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Where a model may come from, in precedence order.
#[derive(Debug, Clone, Default)]
pub struct ModelSources {
    /// `--model` or `READSCOPE_MODEL`
    pub explicit: Option<PathBuf>,
    /// `model` key of the project config, already resolved against the repo root
    pub project: Option<PathBuf>,
    /// Repository root, searched for `readability_model`
    pub repository: Option<PathBuf>,
    /// `model` key of the user config
    pub user: Option<PathBuf>,
    /// User config directory, searched for `readability_model`
    pub user_dir: Option<PathBuf>,
}

impl ModelSources {
    /// Resolve the active model.
    ///
    /// Configured paths must exist. Well-known locations are only probed, and
    /// the embedded default is used when none of them holds a model.
    pub fn resolve(&self) -> Result<Model> {
        if let Some(path) = self.explicit.as_ref().or(self.project.as_ref()) {
            return Model::load(path);
        }
        if let Some(candidate) = probe(self.repository.as_deref()) {
            return Model::load(&candidate);
        }
        if let Some(path) = &self.user {
            return Model::load(path);
        }
        if let Some(candidate) = probe(self.user_dir.as_deref()) {
            return Model::load(&candidate);
        }
        debug!("No model configured, using embedded default");
        Model::embedded_default()
    }
}

fn probe(dir: Option<&Path>) -> Option<PathBuf> {
    dir.map(|d| d.join(MODEL_FILE_NAME)).filter(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_NAMES, SCHEMA};

    fn vector(values: Vec<f64>) -> FeatureVector {
        FeatureVector {
            schema: SCHEMA.to_string(),
            names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            values,
        }
    }

    fn tiny_model(link: &str) -> String {
        format!(
            r#"{{"format":"readscope-model","version":1,"schema":"s","link":"{link}",
               "intercept":0.5,"range":{{"min":0.0,"max":10.0}},
               "features":[{{"name":"a","weight":2.0}},{{"name":"b","weight":-1.0,"target":0.0}}]}}"#
        )
    }

    fn tiny_vector(a: f64, b: f64) -> FeatureVector {
        FeatureVector {
            schema: "s".into(),
            names: vec!["a".into(), "b".into()],
            values: vec![a, b],
        }
    }

    #[test]
    fn test_embedded_default_matches_extractor() {
        let model = Model::embedded_default().unwrap();
        assert_eq!(model.schema, SCHEMA);
        assert!(model.check_schema(SCHEMA, &FEATURE_NAMES).is_ok());
        assert_eq!(model.source(), "<embedded>");
    }

    #[test]
    fn test_score_stays_in_range() {
        let model = Model::embedded_default().unwrap();
        let extremes = [-1e9, -1000.0, -1.0, 0.0, 0.5, 1.0, 1000.0, 1e9];
        for &x in &extremes {
            for i in 0..FEATURE_NAMES.len() {
                let mut values = vec![1.0; FEATURE_NAMES.len()];
                values[i] = x;
                let s = model.score(&vector(values)).unwrap();
                assert!((0.0..=1.0).contains(&s), "score {s} out of range");
            }
        }
    }

    #[test]
    fn test_link_functions() {
        // z = 0.5 + 2*1 - 1*0.5 = 2.0
        let v = tiny_vector(1.0, 0.5);
        let logistic = Model::from_json(&tiny_model("logistic")).unwrap();
        let inverted = Model::from_json(&tiny_model("inverted_logistic")).unwrap();
        let linear = Model::from_json(&tiny_model("linear")).unwrap();

        let s = logistic.score(&v).unwrap();
        assert!((s - 10.0 * sigmoid(2.0)).abs() < 1e-12);
        let s_inv = inverted.score(&v).unwrap();
        assert!((s + s_inv - 10.0).abs() < 1e-12);
        assert_eq!(linear.score(&v).unwrap(), 2.0);
        assert_eq!(linear.score(&tiny_vector(100.0, 0.0)).unwrap(), 10.0);
    }

    #[test]
    fn test_feature_mismatch() {
        let model = Model::from_json(&tiny_model("logistic")).unwrap();

        let mut wrong_schema = tiny_vector(1.0, 1.0);
        wrong_schema.schema = "other".into();
        assert!(matches!(model.score(&wrong_schema), Err(UnitError::FeatureMismatch(_))));

        let reordered = FeatureVector {
            schema: "s".into(),
            names: vec!["b".into(), "a".into()],
            values: vec![1.0, 1.0],
        };
        assert!(matches!(model.score(&reordered), Err(UnitError::FeatureMismatch(_))));

        let short = FeatureVector {
            schema: "s".into(),
            names: vec!["a".into()],
            values: vec![1.0],
        };
        assert!(matches!(model.score(&short), Err(UnitError::FeatureMismatch(_))));

        assert!(matches!(
            model.score(&tiny_vector(f64::NAN, 1.0)),
            Err(UnitError::FeatureMismatch(_))
        ));
    }

    #[test]
    fn test_schema_check_against_extractor() {
        let model = Model::from_json(&tiny_model("logistic")).unwrap();
        let err = model.check_schema(SCHEMA, &FEATURE_NAMES).unwrap_err();
        assert!(matches!(err, ReadscopeError::ModelLoad { .. }));
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_malformed_models_are_rejected() {
        let cases = [
            ("not json", "expected"),
            (r#"{"format":"x","version":1,"schema":"s","link":"linear","intercept":0,"features":[{"name":"a","weight":1}]}"#, "format"),
            (r#"{"format":"readscope-model","version":9,"schema":"s","link":"linear","intercept":0,"features":[{"name":"a","weight":1}]}"#, "version"),
            (r#"{"format":"readscope-model","version":1,"schema":"","link":"linear","intercept":0,"features":[{"name":"a","weight":1}]}"#, "schema"),
            (r#"{"format":"readscope-model","version":1,"schema":"s","link":"linear","intercept":0,"features":[{"name":"a","weight":1},{"name":"a","weight":2}]}"#, "duplicate"),
            (r#"{"format":"readscope-model","version":1,"schema":"s","link":"linear","intercept":0,"range":{"min":1,"max":1},"features":[{"name":"a","weight":1}]}"#, "range"),
            (r#"{"format":"readscope-model","version":1,"schema":"s","link":"cubic","intercept":0,"features":[{"name":"a","weight":1}]}"#, "unknown variant"),
        ];
        for (json, needle) in cases {
            let err = Model::from_json(json).unwrap_err();
            assert!(err.contains(needle), "{err} should mention {needle}");
        }
    }

    #[test]
    fn test_bands() {
        let model = Model::from_json(&tiny_model("linear")).unwrap();
        assert_eq!(model.band(1.0), RatingBand::Low);
        assert_eq!(model.band(5.0), RatingBand::Medium);
        assert_eq!(model.band(9.0), RatingBand::High);
    }

    #[test]
    fn test_missing_explicit_model_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let sources = ModelSources {
            explicit: Some(dir.path().join("nope.json")),
            repository: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(sources.resolve(), Err(ReadscopeError::ModelLoad { .. })));
    }

    #[test]
    fn test_model_resolution_order() {
        let repo = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();

        let none = ModelSources {
            repository: Some(repo.path().to_path_buf()),
            user_dir: Some(user.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(none.resolve().unwrap().source(), "<embedded>");

        std::fs::write(user.path().join(MODEL_FILE_NAME), tiny_model("linear")).unwrap();
        assert!(none.resolve().unwrap().source().starts_with(&user.path().display().to_string()));

        let configured = user.path().join("configured.json");
        std::fs::write(&configured, tiny_model("inverted_logistic")).unwrap();
        let with_user = ModelSources {
            user: Some(configured),
            ..none.clone()
        };
        assert_eq!(with_user.resolve().unwrap().link, Link::InvertedLogistic);

        std::fs::write(repo.path().join(MODEL_FILE_NAME), tiny_model("logistic")).unwrap();
        let model = none.resolve().unwrap();
        assert_eq!(model.link, Link::Logistic);
        assert!(model.source().starts_with(&repo.path().display().to_string()));
    }
}
