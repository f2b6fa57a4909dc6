use std::{fs, path::Path, sync::Arc};

use serde::Deserialize;

use crate::error::{ModelError, SchemaError};
use crate::payload::FeatureVector;
use crate::schema::{FeatureSchema, DEFAULT_CATEGORICAL_FIELDS};

/// What the inference service needs from a fitted classifier.
///
/// Implementations are loaded once and only read afterwards, so a single
/// instance can be shared across request handlers without locking.
pub trait ProbabilityModel: Send + Sync {
    fn version(&self) -> &str;

    /// Attribution baseline, in the same space as `shap_values`.
    fn expected_value(&self) -> f64;

    fn n_features(&self) -> usize;

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError>;

    /// One row per input, one value per schema column, schema order.
    fn shap_values(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f64>>, ModelError>;
}

fn check_dims(batch: &[FeatureVector], expected: usize) -> Result<(), ModelError> {
    match batch.iter().find(|row| row.len() != expected) {
        Some(row) => Err(ModelError::DimensionMismatch {
            got: row.len(),
            expected,
        }),
        None => Ok(()),
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

// ---------- Artifact ----------

#[derive(Deserialize)]
struct ArtifactJson {
    version: String,
    feature_names: Vec<String>,
    categorical_fields: Option<Vec<String>>,
    model: ModelSpec,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelSpec {
    TreeEnsemble {
        base_score: f64,
        trees: Vec<TreeSpec>,
    },
    Linear {
        intercept: f64,
        weights: std::collections::HashMap<String, f64>,
        #[serde(default)]
        reference: std::collections::HashMap<String, f64>,
    },
}

#[derive(Deserialize)]
struct TreeSpec {
    nodes: Vec<NodeSpec>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum NodeSpec {
    Split {
        feature: String,
        threshold: f64,
        yes: usize,
        no: usize,
        #[serde(default = "unit_cover")]
        cover: f64,
    },
    Leaf {
        value: f64,
        #[serde(default = "unit_cover")]
        cover: f64,
    },
}

fn unit_cover() -> f64 {
    1.0
}

impl NodeSpec {
    fn cover(&self) -> f64 {
        match self {
            NodeSpec::Split { cover, .. } | NodeSpec::Leaf { cover, .. } => *cover,
        }
    }
}

/// The frozen schema and the classifier fitted against it.
pub struct LoadedModel {
    pub schema: Arc<FeatureSchema>,
    pub model: Arc<dyn ProbabilityModel>,
}

pub fn load(path: impl AsRef<Path>) -> Result<LoadedModel, SchemaError> {
    let path = path.as_ref();
    let txt = fs::read_to_string(path).map_err(|source| SchemaError::Read {
        path: path.display().to_string(),
        source,
    })?;
    from_json(&txt).map_err(|e| match e {
        LoadFailure::Json(source) => SchemaError::Parse {
            path: path.display().to_string(),
            source,
        },
        LoadFailure::Schema(e) => e,
    })
}

enum LoadFailure {
    Json(serde_json::Error),
    Schema(SchemaError),
}

impl From<SchemaError> for LoadFailure {
    fn from(e: SchemaError) -> Self {
        LoadFailure::Schema(e)
    }
}

fn from_json(txt: &str) -> Result<LoadedModel, LoadFailure> {
    let meta: ArtifactJson = serde_json::from_str(txt).map_err(LoadFailure::Json)?;

    let schema = match &meta.categorical_fields {
        Some(fields) => FeatureSchema::new(meta.feature_names, fields)?,
        None => FeatureSchema::new(meta.feature_names, DEFAULT_CATEGORICAL_FIELDS)?,
    };
    let schema = Arc::new(schema);

    let model: Arc<dyn ProbabilityModel> = match meta.model {
        ModelSpec::TreeEnsemble { base_score, trees } => Arc::new(TreeEnsemble::compile(
            meta.version,
            &schema,
            base_score,
            trees,
        )?),
        ModelSpec::Linear {
            intercept,
            weights,
            reference,
        } => Arc::new(LinearModel::with_reference(
            meta.version,
            &schema,
            intercept,
            weights.iter().map(|(k, v)| (k.as_str(), *v)),
            reference.iter().map(|(k, v)| (k.as_str(), *v)),
        )?),
    };

    tracing::info!(
        version = model.version(),
        n_features = schema.len(),
        "model artifact loaded"
    );
    Ok(LoadedModel { schema, model })
}

// ---------- Gradient-boosted trees ----------

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    // Cover-weighted mean output of the subtree rooted at each node.
    expectation: Vec<f64>,
}

impl Tree {
    fn leaf_for(&self, x: &[f64]) -> usize {
        let mut at = 0;
        while let Node::Split {
            feature,
            threshold,
            yes,
            no,
        } = self.nodes[at]
        {
            at = if x[feature] < threshold { yes } else { no };
        }
        at
    }

    fn attribute(&self, x: &[f64], out: &mut [f64]) {
        let mut at = 0;
        while let Node::Split {
            feature,
            threshold,
            yes,
            no,
        } = self.nodes[at]
        {
            let next = if x[feature] < threshold { yes } else { no };
            out[feature] += self.expectation[next] - self.expectation[at];
            at = next;
        }
    }
}

/// Binary logistic tree ensemble (xgboost-style dump).
///
/// Attributions follow each row's decision path and credit the split feature
/// with the change in expected subtree output, in log-odds space, so that
/// `expected_value + sum(row) == margin` holds exactly.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    version: String,
    n_features: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    fn compile(
        version: String,
        schema: &FeatureSchema,
        base_score: f64,
        specs: Vec<TreeSpec>,
    ) -> Result<Self, SchemaError> {
        let mut trees = Vec::with_capacity(specs.len());
        for (t, spec) in specs.into_iter().enumerate() {
            trees.push(compile_tree(t, schema, &spec.nodes)?);
        }
        Ok(Self {
            version,
            n_features: schema.len(),
            base_score,
            trees,
        })
    }

    fn margin(&self, x: &[f64]) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|t| t.expectation[t.leaf_for(x)])
                .sum::<f64>()
    }
}

fn compile_tree(t: usize, schema: &FeatureSchema, specs: &[NodeSpec]) -> Result<Tree, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidTree { tree: t, reason };
    if specs.is_empty() {
        return Err(invalid("no nodes".into()));
    }

    let mut nodes = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        nodes.push(match spec {
            NodeSpec::Split {
                feature,
                threshold,
                yes,
                no,
                ..
            } => {
                if *yes >= specs.len() || *no >= specs.len() {
                    return Err(invalid(format!("node {} has a child out of range", i)));
                }
                let feature = schema
                    .position(feature)
                    .ok_or_else(|| SchemaError::UnknownFeature(feature.clone()))?;
                Node::Split {
                    feature,
                    threshold: *threshold,
                    yes: *yes,
                    no: *no,
                }
            }
            NodeSpec::Leaf { value, .. } => Node::Leaf { value: *value },
        });
    }

    // Post-order over the reachable nodes; a node seen twice means a cycle or shared child.
    let mut expectation = vec![0.0; specs.len()];
    let mut visited = vec![false; specs.len()];
    let mut stack = vec![(0usize, false)];
    while let Some((at, children_done)) = stack.pop() {
        match &nodes[at] {
            Node::Leaf { value } => {
                if visited[at] {
                    return Err(invalid(format!("node {} reached twice", at)));
                }
                visited[at] = true;
                expectation[at] = *value;
            }
            Node::Split { yes, no, .. } if children_done => {
                let (cy, cn) = (specs[*yes].cover(), specs[*no].cover());
                expectation[at] = if cy + cn > 0.0 {
                    (cy * expectation[*yes] + cn * expectation[*no]) / (cy + cn)
                } else {
                    (expectation[*yes] + expectation[*no]) / 2.0
                };
            }
            Node::Split { yes, no, .. } => {
                if visited[at] {
                    return Err(invalid(format!("node {} reached twice", at)));
                }
                visited[at] = true;
                stack.push((at, true));
                stack.push((*yes, false));
                stack.push((*no, false));
            }
        }
    }

    Ok(Tree { nodes, expectation })
}

impl ProbabilityModel for TreeEnsemble {
    fn version(&self) -> &str {
        &self.version
    }

    fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.expectation[0]).sum::<f64>()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        check_dims(batch, self.n_features)?;
        Ok(batch
            .iter()
            .map(|row| sigmoid(self.margin(row.values())))
            .collect())
    }

    fn shap_values(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f64>>, ModelError> {
        check_dims(batch, self.n_features)?;
        Ok(batch
            .iter()
            .map(|row| {
                let mut out = vec![0.0; self.n_features];
                for tree in &self.trees {
                    tree.attribute(row.values(), &mut out);
                }
                out
            })
            .collect())
    }
}

// ---------- Logistic regression ----------

/// Logistic model with exact additive attributions `w_i * (x_i - reference_i)`.
/// Also serves as the deterministic stand-in for tree models in tests.
#[derive(Debug, Clone)]
pub struct LinearModel {
    version: String,
    intercept: f64,
    weights: Vec<f64>,
    reference: Vec<f64>,
}

impl LinearModel {
    pub fn new<'a>(
        version: impl Into<String>,
        schema: &FeatureSchema,
        intercept: f64,
        weights: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Result<Self, SchemaError> {
        Self::with_reference(version, schema, intercept, weights, std::iter::empty())
    }

    pub fn with_reference<'a, 'b>(
        version: impl Into<String>,
        schema: &FeatureSchema,
        intercept: f64,
        weights: impl IntoIterator<Item = (&'a str, f64)>,
        reference: impl IntoIterator<Item = (&'b str, f64)>,
    ) -> Result<Self, SchemaError> {
        let align = |pairs: Vec<(&str, f64)>| -> Result<Vec<f64>, SchemaError> {
            let mut out = vec![0.0; schema.len()];
            for (name, v) in pairs {
                let i = schema
                    .position(name)
                    .ok_or_else(|| SchemaError::UnknownFeature(name.to_string()))?;
                out[i] = v;
            }
            Ok(out)
        };
        Ok(Self {
            version: version.into(),
            intercept,
            weights: align(weights.into_iter().collect())?,
            reference: align(reference.into_iter().collect())?,
        })
    }

    fn margin(&self, x: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>()
    }
}

impl ProbabilityModel for LinearModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn expected_value(&self) -> f64 {
        self.margin(&self.reference)
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        check_dims(batch, self.weights.len())?;
        Ok(batch.iter().map(|row| sigmoid(self.margin(row.values()))).collect())
    }

    fn shap_values(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f64>>, ModelError> {
        check_dims(batch, self.weights.len())?;
        Ok(batch
            .iter()
            .map(|row| {
                self.weights
                    .iter()
                    .zip(row.values())
                    .zip(&self.reference)
                    .map(|((w, x), r)| w * (x - r))
                    .collect()
            })
            .collect())
    }
}
