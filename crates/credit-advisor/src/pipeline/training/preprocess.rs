use serde::{Deserialize, Serialize};

use super::super::features::{
    EngineeredFeatures, FeatureKind, FeatureValue, MissingFeatureError, FEATURE_CATALOG,
};

/// Extra one-hot slot for categories that were not seen during fitting.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Named model input and how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum ColumnTransform {
    Standardize { mean: f64, scale: f64 },
    OneHot { vocabulary: Vec<String> },
}

impl ColumnTransform {
    fn width(&self) -> usize {
        match self {
            ColumnTransform::Standardize { .. } => 1,
            ColumnTransform::OneHot { vocabulary } => vocabulary.len() + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedColumn {
    pub feature: FeatureSpec,
    #[serde(flatten)]
    pub transform: ColumnTransform,
}

/// Column transform fitted on the training split and replayed at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    columns: Vec<FittedColumn>,
}

/// Catalog features that every row can supply, in catalog order.
pub fn select_features(rows: &[EngineeredFeatures]) -> Vec<FeatureSpec> {
    FEATURE_CATALOG
        .iter()
        .filter(|(name, kind)| rows.iter().all(|row| row.require(name, *kind).is_ok()))
        .map(|(name, kind)| FeatureSpec {
            name: (*name).to_string(),
            kind: *kind,
        })
        .collect()
}

impl Preprocessor {
    pub fn fit(
        features: &[FeatureSpec],
        rows: &[&EngineeredFeatures],
    ) -> Result<Self, MissingFeatureError> {
        let mut columns = Vec::with_capacity(features.len());

        for spec in features {
            let transform = match spec.kind {
                FeatureKind::Numeric => {
                    let values = rows
                        .iter()
                        .map(|row| numeric(row, &spec.name))
                        .collect::<Result<Vec<_>, _>>()?;
                    standardize(&values)
                }
                FeatureKind::Categorical => {
                    let mut vocabulary = rows
                        .iter()
                        .map(|row| categorical(row, &spec.name))
                        .collect::<Result<Vec<_>, _>>()?;
                    vocabulary.sort();
                    vocabulary.dedup();
                    ColumnTransform::OneHot { vocabulary }
                }
            };

            columns.push(FittedColumn {
                feature: spec.clone(),
                transform,
            });
        }

        Ok(Self { columns })
    }

    pub fn feature_list(&self) -> Vec<FeatureSpec> {
        self.columns
            .iter()
            .map(|column| column.feature.clone())
            .collect()
    }

    pub fn columns(&self) -> &[FittedColumn] {
        &self.columns
    }

    /// Number of encoded columns produced per row.
    pub fn width(&self) -> usize {
        self.columns.iter().map(|column| column.transform.width()).sum()
    }

    pub fn transform(&self, row: &EngineeredFeatures) -> Result<Vec<f64>, MissingFeatureError> {
        let mut encoded = Vec::with_capacity(self.width());

        for column in &self.columns {
            match &column.transform {
                ColumnTransform::Standardize { mean, scale } => {
                    let value = numeric(row, &column.feature.name)?;
                    encoded.push((value - mean) / scale);
                }
                ColumnTransform::OneHot { vocabulary } => {
                    let value = categorical(row, &column.feature.name)?;
                    let hit = vocabulary.binary_search(&value).ok();
                    encoded.extend((0..vocabulary.len()).map(|idx| {
                        if hit == Some(idx) {
                            1.0
                        } else {
                            0.0
                        }
                    }));
                    encoded.push(if hit.is_none() { 1.0 } else { 0.0 });
                }
            }
        }

        Ok(encoded)
    }
}

fn numeric(row: &EngineeredFeatures, name: &str) -> Result<f64, MissingFeatureError> {
    match row.require(name, FeatureKind::Numeric)? {
        FeatureValue::Numeric(value) => Ok(value),
        FeatureValue::Categorical(_) => Err(MissingFeatureError {
            feature: name.to_string(),
        }),
    }
}

fn categorical(row: &EngineeredFeatures, name: &str) -> Result<String, MissingFeatureError> {
    match row.require(name, FeatureKind::Categorical)? {
        FeatureValue::Categorical(value) => Ok(value),
        FeatureValue::Numeric(_) => Err(MissingFeatureError {
            feature: name.to_string(),
        }),
    }
}

fn standardize(values: &[f64]) -> ColumnTransform {
    if values.is_empty() {
        return ColumnTransform::Standardize {
            mean: 0.0,
            scale: 1.0,
        };
    }

    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();
    let scale = if std_dev > f64::EPSILON { std_dev } else { 1.0 };

    ColumnTransform::Standardize { mean, scale }
}
