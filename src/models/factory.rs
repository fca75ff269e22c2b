use crate::config::ModelFamily;
use crate::models::classifier_trait::Classifier;
use crate::models::elastic_net::ElasticNetClassifier;
use crate::models::knn::KnnClassifier;
use crate::models::random_forest::RandomForestClassifier;
use crate::models::svm::SvmClassifier;

/// Build a boxed classifier from a model configuration.
///
/// `seed` drives the stochastic families (bootstrap sampling, SGD
/// shuffling); the deterministic families ignore it.
pub fn build_model(config: &ModelFamily, seed: u64) -> Box<dyn Classifier> {
    match config {
        ModelFamily::Knn { neighbors } => Box::new(KnnClassifier::new(*neighbors)),
        ModelFamily::ElasticNet { penalty, mixture } => {
            Box::new(ElasticNetClassifier::new(*penalty, *mixture))
        }
        ModelFamily::RandomForest { mtry, min_n, trees } => {
            Box::new(RandomForestClassifier::new(*mtry, *min_n, *trees, seed))
        }
        ModelFamily::Svm { cost } => Box::new(SvmClassifier::new(*cost, seed)),
    }
}
