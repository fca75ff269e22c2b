//! Integration tests for stratified splitting and fold assignment.

use gas_screen::data::{stratified_folds, stratified_split, Column, Dataset, Label};

fn clinic_dataset(n: usize) -> Dataset {
    let age: Vec<Option<f32>> = (0..n).map(|i| Some(3.0 + (i % 13) as f32)).collect();
    let cough: Vec<Option<u8>> = (0..n).map(|i| Some((i % 2) as u8)).collect();
    // Roughly one third positive, like the clinic population.
    let labels: Vec<Label> = (0..n)
        .map(|i| if i % 3 == 0 { Label::Positive } else { Label::Negative })
        .collect();
    Dataset::new(
        vec![
            Column::numeric("age", age),
            Column::categorical("cough", vec!["no".into(), "yes".into()], cough),
        ],
        labels,
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Train/test split
// ---------------------------------------------------------------------------

#[test]
fn same_seed_gives_byte_identical_partitions() {
    let data = clinic_dataset(120);
    for seed in [0u64, 1, 7, 4817] {
        let (tr_a, te_a) = stratified_split(&data, 0.8, seed).unwrap();
        let (tr_b, te_b) = stratified_split(&data, 0.8, seed).unwrap();
        assert_eq!(tr_a, tr_b);
        assert_eq!(te_a, te_b);
    }
}

#[test]
fn split_is_disjoint_and_exhaustive() {
    let data = clinic_dataset(101);
    let (train, test) = stratified_split(&data, 0.8, 5).unwrap();
    assert_eq!(train.n_rows() + test.n_rows(), data.n_rows());

    // Every record carries a unique age/cough/label combination count;
    // compare multisets of (age, label) rows across the two subsets.
    let key = |d: &Dataset, i: usize| {
        let age = match &d.column("age").unwrap().values {
            gas_screen::data::ColumnValues::Numeric(v) => v[i].unwrap(),
            _ => unreachable!(),
        };
        (age.to_bits(), d.labels[i])
    };
    let mut combined: Vec<_> = (0..train.n_rows())
        .map(|i| key(&train, i))
        .chain((0..test.n_rows()).map(|i| key(&test, i)))
        .collect();
    let mut original: Vec<_> = (0..data.n_rows()).map(|i| key(&data, i)).collect();
    combined.sort_unstable();
    original.sort_unstable();
    assert_eq!(combined, original, "no record may be lost or duplicated");
}

#[test]
fn each_class_splits_at_the_declared_fraction() {
    let data = clinic_dataset(120);
    let (neg_total, pos_total) = data.class_counts();
    let (train, _) = stratified_split(&data, 0.8, 11).unwrap();
    let (neg_train, pos_train) = train.class_counts();

    let expected_pos = (0.8 * pos_total as f64).round() as usize;
    let expected_neg = (0.8 * neg_total as f64).round() as usize;
    assert!((pos_train as i64 - expected_pos as i64).abs() <= 1);
    assert!((neg_train as i64 - expected_neg as i64).abs() <= 1);
}

// ---------------------------------------------------------------------------
// Cross-validation folds
// ---------------------------------------------------------------------------

#[test]
fn folds_are_deterministic_and_exhaustive() {
    let data = clinic_dataset(90);
    let a = stratified_folds(&data, 10, 3).unwrap();
    let b = stratified_folds(&data, 10, 3).unwrap();
    assert_eq!(a, b);

    let mut all: Vec<usize> = (0..a.k()).flat_map(|i| a.held_out(i).to_vec()).collect();
    all.sort_unstable();
    assert_eq!(all, (0..90).collect::<Vec<_>>());
}

#[test]
fn folds_preserve_class_balance() {
    let data = clinic_dataset(90); // 30 positive, 60 negative
    let folds = stratified_folds(&data, 5, 9).unwrap();
    for i in 0..folds.k() {
        let held = data.select_rows(folds.held_out(i));
        let (negatives, positives) = held.class_counts();
        assert_eq!(positives, 6);
        assert_eq!(negatives, 12);
    }
}
