pub mod classifier_trait;
pub mod elastic_net;
pub mod factory;
pub mod knn;
pub mod random_forest;
pub mod svm;

pub use classifier_trait::Classifier;
pub use factory::build_model;
