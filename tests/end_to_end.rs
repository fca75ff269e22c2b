//! End-to-end scenarios: separable signal, noise labels, evaluator
//! determinism, and the full comparison run.

use gas_screen::config::{FamilyKind, ModelFamily, SelectionPolicy};
use gas_screen::data::{stratified_folds, stratified_split, Column, Dataset, Label};
use gas_screen::pipeline::{evaluate, run_comparison, ComparisonConfig, FinalModel};
use gas_screen::recipe::Recipe;
use gas_screen::tune::{select_configuration, tune_grid, FamilySpec};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

fn symptom_levels() -> Vec<String> {
    vec!["no".into(), "yes".into()]
}

/// 20 records where tonsillar exudate perfectly tracks the label.
fn separable_dataset() -> Dataset {
    let labels: Vec<Label> = (0..20)
        .map(|i| if i % 2 == 0 { Label::Positive } else { Label::Negative })
        .collect();
    let exudate: Vec<Option<u8>> = labels
        .iter()
        .map(|&l| Some(if l == Label::Positive { 1 } else { 0 }))
        .collect();
    let age: Vec<Option<f32>> = (0..20).map(|i| Some(3.0 + (i % 7) as f32)).collect();
    Dataset::new(
        vec![
            Column::numeric("age", age),
            Column::categorical("tonsillar_exudate", symptom_levels(), exudate),
        ],
        labels,
    )
    .unwrap()
}

/// Labels assigned independently of every feature.
fn noise_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let age: Vec<Option<f32>> = (0..n).map(|_| Some(rng.gen_range(2.0..15.0))).collect();
    let cough: Vec<Option<u8>> = (0..n).map(|_| Some(rng.gen_range(0..2) as u8)).collect();
    // Balanced random labels, drawn after the features.
    let mut labels: Vec<Label> = (0..n)
        .map(|i| if i < n / 2 { Label::Positive } else { Label::Negative })
        .collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        labels.swap(i, j);
    }
    Dataset::new(
        vec![
            Column::numeric("age", age),
            Column::categorical("cough", symptom_levels(), cough),
        ],
        labels,
    )
    .unwrap()
}

/// A clinic-like table with signal, noise and some missing cells.
fn clinic_dataset(n: usize) -> Dataset {
    let labels: Vec<Label> = (0..n)
        .map(|i| if i % 2 == 0 { Label::Positive } else { Label::Negative })
        .collect();
    let age: Vec<Option<f32>> = (0..n)
        .map(|i| {
            if i % 13 == 0 {
                None
            } else {
                let base = if labels[i] == Label::Positive { 8.0 } else { 4.0 };
                Some(base + (i % 5) as f32)
            }
        })
        .collect();
    let exudate: Vec<Option<u8>> = (0..n)
        .map(|i| {
            let truthful = if labels[i] == Label::Positive { 1 } else { 0 };
            // A few contradictory and missing observations.
            if i % 17 == 0 {
                None
            } else if i % 10 == 0 {
                Some(1 - truthful)
            } else {
                Some(truthful)
            }
        })
        .collect();
    let cough: Vec<Option<u8>> = (0..n).map(|i| Some(((i / 3) % 2) as u8)).collect();
    Dataset::new(
        vec![
            Column::numeric("age", age),
            Column::categorical("tonsillar_exudate", symptom_levels(), exudate),
            Column::categorical("cough", symptom_levels(), cough),
        ],
        labels,
    )
    .unwrap()
}

fn small_knn_spec(seed: u64) -> FamilySpec {
    FamilySpec {
        kind: FamilyKind::Knn,
        grid: vec![
            ModelFamily::Knn { neighbors: 1 },
            ModelFamily::Knn { neighbors: 3 },
            ModelFamily::Knn { neighbors: 5 },
        ],
        policy: SelectionPolicy::BestMean,
        recipe: Recipe::normalized(),
        seed,
    }
}

#[test]
fn separable_signal_exceeds_nine_five_auc() {
    let data = separable_dataset();
    let folds = stratified_folds(&data, 5, 21).unwrap();
    let surface = tune_grid(&data, &folds, &small_knn_spec(21)).unwrap();
    let chosen = select_configuration(&surface, &SelectionPolicy::BestMean).unwrap();
    assert!(
        chosen.mean > 0.95,
        "perfectly correlated symptom should give near-perfect AUC, got {}",
        chosen.mean
    );
}

#[test]
fn noise_labels_stay_near_chance_for_every_family() {
    let data = noise_dataset(60, 99);
    let folds = stratified_folds(&data, 5, 13).unwrap();

    let specs = vec![
        small_knn_spec(1),
        FamilySpec {
            kind: FamilyKind::ElasticNet,
            grid: vec![ModelFamily::ElasticNet { penalty: 0.01, mixture: 0.5 }],
            policy: SelectionPolicy::BestMean,
            recipe: Recipe::normalized(),
            seed: 2,
        },
        FamilySpec {
            kind: FamilyKind::RandomForest,
            grid: vec![ModelFamily::RandomForest { mtry: 1, min_n: 5, trees: 50 }],
            policy: SelectionPolicy::BestMean,
            recipe: Recipe::raw(),
            seed: 3,
        },
        FamilySpec {
            kind: FamilyKind::Svm,
            grid: vec![ModelFamily::Svm { cost: 1.0 }],
            policy: SelectionPolicy::BestMean,
            recipe: Recipe::normalized(),
            seed: 4,
        },
    ];

    for spec in specs {
        let surface = tune_grid(&data, &folds, &spec).unwrap();
        let chosen = select_configuration(&surface, &spec.policy).unwrap();
        assert!(
            (chosen.mean - 0.5).abs() < 0.3,
            "{}: noise labels should score near 0.5, got {}",
            spec.kind,
            chosen.mean
        );
    }
}

#[test]
fn evaluator_is_deterministic_across_invocations() {
    let data = clinic_dataset(100);
    let (train, test) = stratified_split(&data, 0.8, 7).unwrap();
    let config = ModelFamily::RandomForest { mtry: 2, min_n: 5, trees: 50 };
    let model = FinalModel::fit(&config, &Recipe::raw(), &train, 17).unwrap();

    let (auc_a, curve_a) = evaluate(&model, &test).unwrap();
    let (auc_b, curve_b) = evaluate(&model, &test).unwrap();
    assert_eq!(auc_a, auc_b);
    assert_eq!(curve_a, curve_b);
}

#[test]
fn full_comparison_produces_the_report_contract() {
    let data = clinic_dataset(120);
    let config = ComparisonConfig {
        folds: 5,
        seed: 31,
        ..ComparisonConfig::default()
    };
    let report = run_comparison(&data, &config).unwrap();

    assert_eq!(report.leaderboard.len(), 4);
    assert_eq!(report.test_metrics.len(), 4);
    for window in report.leaderboard.windows(2) {
        assert!(window[0].mean_auc <= window[1].mean_auc, "ascending order");
    }
    for family in &report.families {
        assert!((0.0..=1.0).contains(&family.test_auc));
        let first = family.roc_curve.first().unwrap();
        let last = family.roc_curve.last().unwrap();
        assert_eq!((first.false_positive_rate, first.true_positive_rate), (0.0, 0.0));
        assert_eq!((last.false_positive_rate, last.true_positive_rate), (1.0, 1.0));
    }
    let forest = report
        .families
        .iter()
        .find(|f| f.family == "random_forest")
        .unwrap();
    let importance = forest.importance.as_ref().expect("forest reports importance");
    assert!(!importance.is_empty());
    for window in importance.windows(2) {
        assert!(window[0].score >= window[1].score, "ranked best first");
    }
}
