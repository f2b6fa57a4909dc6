use std::sync::Arc;

use crate::error::{ModelError, ServiceError};
use crate::model::{LoadedModel, ProbabilityModel};
use crate::payload::{self, FeatureVector};
use crate::schema::FeatureSchema;
use crate::types::{
    BatchExplanation, BatchPrediction, Contribution, ExplanationResult, PredictionResult,
    RawPlateAppearance,
};

pub const DEFAULT_TOP_N: usize = 10;

/// Stateless composition of the payload builder and a model.
///
/// Cloning is cheap; clones share the same schema and model.
#[derive(Clone)]
pub struct InferenceService {
    schema: Arc<FeatureSchema>,
    model: Arc<dyn ProbabilityModel>,
}

impl InferenceService {
    /// Fails when the model and schema disagree on the feature count.
    pub fn new(
        schema: Arc<FeatureSchema>,
        model: Arc<dyn ProbabilityModel>,
    ) -> Result<Self, ModelError> {
        if model.n_features() != schema.len() {
            return Err(ModelError::SchemaMismatch {
                model: model.n_features(),
                schema: schema.len(),
            });
        }
        Ok(Self { schema, model })
    }

    pub fn from_loaded(loaded: LoadedModel) -> Result<Self, ModelError> {
        Self::new(loaded.schema, loaded.model)
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn model_version(&self) -> &str {
        self.model.version()
    }

    pub fn features(&self, raw: &RawPlateAppearance) -> FeatureVector {
        let vector = payload::build(&self.schema, raw.fields());
        if tracing::enabled!(tracing::Level::DEBUG) {
            let sample: Vec<String> = vector
                .iter()
                .take(6)
                .map(|(name, v)| format!("{}={:.3}", name, v))
                .collect();
            tracing::debug!(
                in_dim = vector.len(),
                nonzero = vector.nonzero(),
                sample = %sample.join(", "),
                "built feature vector"
            );
        }
        vector
    }

    pub fn predict(&self, raw: &RawPlateAppearance) -> Result<PredictionResult, ServiceError> {
        let rows = [self.features(raw)];
        let probability = single(self.probabilities(&rows)?)?;
        Ok(PredictionResult {
            probability,
            model_version: self.model.version().to_string(),
        })
    }

    /// One probability per input row, in input order.
    pub fn predict_batch(&self, raws: &[RawPlateAppearance]) -> Result<BatchPrediction, ServiceError> {
        if raws.is_empty() {
            return Ok(BatchPrediction {
                probabilities: Vec::new(),
            });
        }
        let rows: Vec<FeatureVector> = raws.iter().map(|r| self.features(r)).collect();
        let probabilities = self.probabilities(&rows)?;
        Ok(BatchPrediction { probabilities })
    }

    pub fn explain(
        &self,
        raw: &RawPlateAppearance,
        top_n: usize,
    ) -> Result<ExplanationResult, ServiceError> {
        if top_n == 0 {
            return Err(ServiceError::InvalidTopN);
        }
        let rows = [self.features(raw)];
        let probability = single(self.probabilities(&rows)?)?;
        let attributions = single(self.attributions(&rows)?)?;
        Ok(ExplanationResult {
            probability,
            baseline: self.model.expected_value(),
            contributions: self.top_contributions(&attributions, top_n),
        })
    }

    pub fn explain_batch(
        &self,
        raws: &[RawPlateAppearance],
        top_n: usize,
    ) -> Result<BatchExplanation, ServiceError> {
        if top_n == 0 {
            return Err(ServiceError::InvalidTopN);
        }
        let baseline = self.model.expected_value();
        if raws.is_empty() {
            return Ok(BatchExplanation {
                probabilities: Vec::new(),
                baseline,
                contributions: Vec::new(),
            });
        }

        let rows: Vec<FeatureVector> = raws.iter().map(|r| self.features(r)).collect();
        let probabilities = self.probabilities(&rows)?;
        let contributions = self
            .attributions(&rows)?
            .iter()
            .map(|row| self.top_contributions(row, top_n))
            .collect();
        Ok(BatchExplanation {
            probabilities,
            baseline,
            contributions,
        })
    }

    fn probabilities(&self, rows: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        let out = self.model.predict_proba(rows)?;
        same_length(out, rows.len())
    }

    fn attributions(&self, rows: &[FeatureVector]) -> Result<Vec<Vec<f64>>, ModelError> {
        let out = self.model.shap_values(rows)?;
        same_length(out, rows.len())
    }

    // Largest |impact| first; equal magnitudes keep schema order.
    fn top_contributions(&self, row: &[f64], top_n: usize) -> Vec<Contribution> {
        let mut ranked: Vec<(usize, f64)> = row.iter().map(|v| v.abs()).enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(top_n)
            .filter_map(|(i, impact)| {
                self.schema.columns().get(i).map(|name| Contribution {
                    feature: name.clone(),
                    impact,
                })
            })
            .collect()
    }
}

fn same_length<T>(out: Vec<T>, expected: usize) -> Result<Vec<T>, ModelError> {
    if out.len() != expected {
        return Err(ModelError::OutputLength {
            got: out.len(),
            expected,
        });
    }
    Ok(out)
}

fn single<T>(out: Vec<T>) -> Result<T, ModelError> {
    let got = out.len();
    out.into_iter()
        .next()
        .ok_or(ModelError::OutputLength { got, expected: 1 })
}
