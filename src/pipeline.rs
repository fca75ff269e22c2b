//! End-to-end orchestration: split, tune, select, refit, evaluate.
use ndarray::Array1;

use crate::config::{FamilyKind, ModelFamily};
use crate::data::{stratified_folds, stratified_split, Dataset, Label};
use crate::error::PipelineError;
use crate::metrics::{roc_auc, roc_curve, RocPoint};
use crate::models::{build_model, Classifier};
use crate::recipe::{FittedRecipe, Recipe};
use crate::report::{ComparisonReport, FamilyReport, ImportanceEntry};
use crate::tune::{select_configuration, tune_grid, FamilySpec};

/// Parameters of one batch comparison run.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    pub train_fraction: f64,
    pub folds: usize,
    pub seed: u64,
    pub families: Vec<FamilyKind>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            train_fraction: 0.8,
            folds: 10,
            seed: 4817,
            families: vec![
                FamilyKind::Knn,
                FamilyKind::ElasticNet,
                FamilyKind::RandomForest,
                FamilyKind::Svm,
            ],
        }
    }
}

/// A selected configuration refit on the entire training subset, bound to
/// the recipe that was fit alongside it. The fitted recipe lives inside and
/// is reused verbatim at evaluation time; it is never refit on test data.
pub struct FinalModel {
    config: ModelFamily,
    recipe: FittedRecipe,
    model: Box<dyn Classifier>,
}

impl FinalModel {
    /// Refit the recipe and estimator on the full training subset.
    pub fn fit(
        config: &ModelFamily,
        recipe: &Recipe,
        train: &Dataset,
        seed: u64,
    ) -> Result<Self, PipelineError> {
        let fitted = recipe.fit(train)?;
        let design = fitted.apply(train)?;
        let mut model = build_model(config, seed);
        model.fit(&design.x, &design.labels)?;
        Ok(FinalModel {
            config: config.clone(),
            recipe: fitted,
            model,
        })
    }

    pub fn config(&self) -> &ModelFamily {
        &self.config
    }

    /// Per-record probability of the Positive class.
    pub fn predict_proba(&self, data: &Dataset) -> Result<Array1<f32>, PipelineError> {
        let design = self.recipe.apply(data)?;
        self.model.predict_proba(&design.x)
    }

    /// Ranked feature contributions, best first, for families that
    /// support them.
    pub fn feature_importance(&self) -> Option<Vec<ImportanceEntry>> {
        let scores = self.model.feature_importance()?;
        let mut entries: Vec<ImportanceEntry> = self
            .recipe
            .feature_names()
            .iter()
            .zip(scores)
            .map(|(feature, score)| ImportanceEntry {
                feature: feature.clone(),
                score,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Some(entries)
    }
}

/// Score a final model on held-out data: test ROC AUC plus the full curve.
/// Reuses the model's fitted recipe, so repeated invocations return
/// identical values.
pub fn evaluate(
    model: &FinalModel,
    test: &Dataset,
) -> Result<(f32, Vec<RocPoint>), PipelineError> {
    let probs = model.predict_proba(test)?;
    // The comparison ranks by the predicted probability of the Negative
    // class, the source workflow's event convention.
    let negative_scores = probs.mapv(|p| 1.0 - p);
    let auc = roc_auc(&negative_scores, &test.labels, Label::Negative)?;
    let curve = roc_curve(&negative_scores, &test.labels, Label::Negative)?;
    Ok((auc, curve))
}

/// Run the whole comparison: stratified split, per-family grid tuning over
/// shared folds, selection, refit on the full training subset, and test-set
/// evaluation. Produces the report tables the external collaborator plots.
pub fn run_comparison(
    data: &Dataset,
    config: &ComparisonConfig,
) -> Result<ComparisonReport, PipelineError> {
    let (train, test) = stratified_split(data, config.train_fraction, config.seed)?;
    let folds = stratified_folds(&train, config.folds, config.seed.wrapping_add(1))?;

    // Encoded width of the predictor space, needed to declare grids
    // (e.g. the mtry range). Statistics from this fit are discarded.
    let n_encoded = Recipe::raw().fit(&train)?.feature_names().len();

    let mut families = Vec::with_capacity(config.families.len());
    for (family_idx, &kind) in config.families.iter().enumerate() {
        let spec = FamilySpec::with_defaults(
            kind,
            n_encoded,
            config.seed.wrapping_add(100 + family_idx as u64),
        )?;
        let surface = tune_grid(&train, &folds, &spec)?;
        let chosen = select_configuration(&surface, &spec.policy)?.clone();
        log::info!(
            "{}: selected {} with CV AUC {:.4} (se {:.4})",
            kind,
            chosen.config.describe(),
            chosen.mean,
            chosen.std_err
        );

        let final_model = FinalModel::fit(
            &chosen.config,
            &spec.recipe,
            &train,
            spec.seed.wrapping_add(u64::MAX / 2),
        )?;
        let (test_auc, roc) = evaluate(&final_model, &test)?;
        log::info!("{}: test AUC {:.4}", kind, test_auc);

        families.push(FamilyReport {
            family: kind.to_string(),
            selected_config: chosen.config.describe(),
            cv_mean_auc: chosen.mean,
            cv_std_err: chosen.std_err,
            test_auc,
            roc_curve: roc,
            importance: final_model.feature_importance(),
        });
    }

    Ok(ComparisonReport::from_families(families))
}
