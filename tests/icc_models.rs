use icc_harness::{
    compute_icc, estimate_variance_components, IccAnalysis, IccModel, IccValue, RatingRow,
    RatingTable, Reliability,
};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Six targets, four judges (Shrout & Fleiss, 1979).
fn shrout_fleiss() -> RatingTable {
    RatingTable::from_matrix(&[
        vec![9.0, 2.0, 5.0, 8.0],
        vec![6.0, 1.0, 3.0, 2.0],
        vec![8.0, 4.0, 6.0, 8.0],
        vec![7.0, 1.0, 2.0, 6.0],
        vec![10.0, 5.0, 6.0, 9.0],
        vec![6.0, 2.0, 4.0, 7.0],
    ])
    .unwrap()
}

/// Five subjects, three raters, every cell rated twice.
fn balanced_replicated() -> RatingTable {
    let rows = vec![
        RatingRow::complete("s0", &[0.4, 1.9, -0.1]),
        RatingRow::complete("s0", &[1.2, 2.7, 0.7]),
        RatingRow::complete("s1", &[4.6, 6.9, 5.7]),
        RatingRow::complete("s1", &[3.4, 5.7, 4.5]),
        RatingRow::complete("s2", &[6.8, 9.9, 7.1]),
        RatingRow::complete("s2", &[7.6, 10.7, 7.9]),
        RatingRow::complete("s3", &[3.0, 4.5, 2.5]),
        RatingRow::complete("s3", &[1.8, 3.3, 1.3]),
        RatingRow::complete("s4", &[5.2, 7.5, 6.3]),
        RatingRow::complete("s4", &[6.0, 8.3, 7.1]),
    ];
    RatingTable::from_rows(rows).unwrap()
}

fn inter(table: &RatingTable, model: IccModel) -> f64 {
    IccAnalysis::new(table, model)
        .unwrap()
        .icc()
        .inter
        .value()
        .unwrap()
}

#[test]
fn shrout_fleiss_coefficients() {
    let table = shrout_fleiss();
    assert!(approx_eq(inter(&table, IccModel::OneWaySubject), 0.165_74, 1e-4));
    assert!(approx_eq(inter(&table, IccModel::TwoWayRandom), 0.289_76, 1e-4));
    assert!(approx_eq(inter(&table, IccModel::TwoWayMixed), 0.714_84, 1e-4));

    let analysis = IccAnalysis::new(&table, IccModel::OneWayRater).unwrap();
    let intra = analysis.icc().intra.value().unwrap();
    assert!(approx_eq(intra, 0.574_08, 1e-4));
}

#[test]
fn shrout_fleiss_mean_squares() {
    let analysis = IccAnalysis::new(&shrout_fleiss(), IccModel::TwoWayRandom).unwrap();
    let ms = analysis.mean_squares();
    assert!(approx_eq(ms.mss().unwrap(), 11.2417, 1e-4));
    assert!(approx_eq(ms.msr().unwrap(), 32.4861, 1e-4));
    assert!(approx_eq(ms.mse().unwrap(), 1.0194, 1e-4));

    let one_way = IccAnalysis::new(&shrout_fleiss(), IccModel::OneWaySubject).unwrap();
    assert!(approx_eq(one_way.mean_squares().mse().unwrap(), 6.2639, 1e-4));
}

#[test]
fn interaction_models_without_replication_fold_interaction_into_error() {
    let table = shrout_fleiss();
    let plain = inter(&table, IccModel::TwoWayRandom);
    let folded = inter(&table, IccModel::TwoWayRandomInteraction);
    assert!(approx_eq(plain, folded, 1e-12));

    let (components, _) =
        estimate_variance_components(&table, IccModel::TwoWayMixedInteraction).unwrap();
    assert_eq!(components.interaction, None);
    assert!(!components.replicated);
}

#[test]
fn balanced_replicated_components_match_closed_forms() {
    let table = balanced_replicated();
    let analysis = IccAnalysis::new(&table, IccModel::TwoWayRandomInteraction).unwrap();
    let ms = analysis.mean_squares();
    let (mss, msr, msi, mse) = (
        ms.mss().unwrap(),
        ms.msr().unwrap(),
        ms.msi().unwrap(),
        ms.mse().unwrap(),
    );
    let (n, r, m) = (5.0, 3.0, 2.0);

    let vc = analysis.components();
    assert!(vc.clamped.is_empty());
    assert!(approx_eq(vc.subject.unwrap(), (mss - msi) / (r * m), 1e-9));
    assert!(approx_eq(vc.rater.unwrap(), (msr - msi) / (n * m), 1e-9));
    assert!(approx_eq(vc.interaction.unwrap(), (msi - mse) / m, 1e-9));
    assert!(approx_eq(vc.error, mse, 1e-9));

    let dfs: Vec<f64> = ms.terms().iter().map(|t| t.df).collect();
    assert_eq!(dfs, vec![4.0, 2.0, 8.0, 15.0]);
}

#[test]
fn balanced_replicated_mixed_interaction_is_restricted() {
    let table = balanced_replicated();
    let analysis = IccAnalysis::new(&table, IccModel::TwoWayMixedInteraction).unwrap();
    let ms = analysis.mean_squares();
    let (mss, msi, mse) = (ms.mss().unwrap(), ms.msi().unwrap(), ms.mse().unwrap());
    let (r, m) = (3.0, 2.0);

    let vc = analysis.components();
    assert!(approx_eq(vc.subject.unwrap(), (mss - mse) / (r * m), 1e-9));
    assert!(approx_eq(
        vc.interaction.unwrap(),
        (r - 1.0) * (msi - mse) / (r * m),
        1e-9
    ));

    let est = analysis.icc();
    assert!(approx_eq(est.inter.value().unwrap(), 0.944_41, 1e-4));
    assert!(approx_eq(est.intra.value().unwrap(), 0.946_20, 1e-4));
}

#[test]
fn replicated_random_model_reports_both_coefficients() {
    let table = balanced_replicated();
    let analysis = IccAnalysis::new(&table, IccModel::TwoWayRandomInteraction).unwrap();
    let est = analysis.icc();
    assert!(approx_eq(est.inter.value().unwrap(), 0.825_01, 1e-4));
    assert!(approx_eq(est.intra.value().unwrap(), 0.953_01, 1e-4));
    assert!(compute_icc(analysis.components(), IccModel::TwoWayRandomInteraction) == est);
}

#[test]
fn missing_cells_change_estimates_without_failing() {
    let complete = shrout_fleiss();
    let sparse = RatingTable::from_rows(vec![
        RatingRow::new("1", vec![Some(9.0), Some(2.0), None, Some(8.0)]),
        RatingRow::new("2", vec![Some(6.0), Some(1.0), Some(3.0), Some(2.0)]),
        RatingRow::new("3", vec![Some(8.0), None, Some(6.0), Some(8.0)]),
        RatingRow::new("4", vec![Some(7.0), Some(1.0), Some(2.0), None]),
        RatingRow::new("5", vec![Some(10.0), Some(5.0), Some(6.0), Some(9.0)]),
        RatingRow::new("6", vec![None, Some(2.0), Some(4.0), Some(7.0)]),
    ])
    .unwrap();

    for model in IccModel::ALL {
        let analysis = IccAnalysis::new(&sparse, model).unwrap();
        let value = analysis.icc().get(model.primary_reliability());
        let v = value.value().unwrap();
        assert!((0.0..=1.0).contains(&v), "{model}: {v}");
    }

    let (_, counts) = estimate_variance_components(&sparse, IccModel::TwoWayRandom).unwrap();
    assert_eq!(counts.total_ratings, 20);
    assert_eq!(counts.max_replication, 4);
    assert_eq!(counts.min_replication, 3);
    assert_ne!(
        inter(&complete, IccModel::TwoWayRandom),
        inter(&sparse, IccModel::TwoWayRandom)
    );
}

#[test]
fn rater_with_one_subject_is_degenerate() {
    let table = RatingTable::from_rows(vec![
        RatingRow::new("a", vec![Some(1.0), Some(2.0), Some(4.0)]),
        RatingRow::new("b", vec![Some(2.0), Some(3.0), None]),
        RatingRow::new("c", vec![Some(4.0), Some(6.0), None]),
    ])
    .unwrap();

    for model in IccModel::ALL {
        let err = IccAnalysis::new(&table, model).unwrap_err();
        assert!(err.is_degenerate(), "{model}: {err}");
    }
}

#[test]
fn intra_rater_is_not_applicable_to_single_occasion_designs() {
    let analysis = IccAnalysis::new(&shrout_fleiss(), IccModel::TwoWayMixed).unwrap();
    assert_eq!(analysis.icc().intra, IccValue::NotApplicable);
    let err = analysis
        .confidence_interval(Reliability::IntraRater, 0.95)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_input");
}
