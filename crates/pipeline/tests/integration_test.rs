//! Integration tests for the feature pipeline.
//!
//! These tests fit a full encoder set on a small corpus and check that
//! training and serving produce vectors with the same layout.

use data_loader::RawSample;
use pipeline::{
    EncoderConfig, FeatureAssembler, FeatureField, FeatureScaler, FittedEncoderSet,
};
use std::sync::Arc;

fn movie(id: u64, genres: &[&str], rating: &str, month: u32, day: u32) -> RawSample {
    let mut sample = RawSample::new(id);
    sample.title = Some(format!("Movie {id}"));
    sample.budget = Some(id * 10_000_000);
    sample.runtime = Some(90.0 + id as f64);
    sample.genres = genres.iter().map(|g| g.to_string()).collect();
    sample.rating = Some(rating.to_string());
    sample.month = Some(month);
    sample.day = Some(day);
    sample.directors = vec![format!("Director {id}")];
    sample.producers = vec!["Kevin Feige".to_string(), format!("Producer {id}")];
    sample.writers = vec![format!("Writer {id}")];
    sample.studios = vec!["Marvel Studios".to_string()];
    sample.keywords = vec!["superhero".to_string(), "sequel".to_string()];
    sample.cast = vec![format!("Actor {id}")];
    sample
}

fn training_samples() -> Vec<RawSample> {
    vec![
        movie(1, &["Action"], "PG-13", 5, 4),
        movie(2, &["Adventure", "Action"], "PG-13", 7, 7),
        movie(3, &["Drama"], "R", 11, 22),
        movie(4, &["Drama", "Adventure"], "PG", 12, 25),
    ]
}

fn fitted() -> Arc<FittedEncoderSet> {
    Arc::new(
        EncoderConfig::new()
            .with_hash_width(32)
            .fit(&training_samples())
            .unwrap(),
    )
}

#[test]
fn test_genre_segment_for_action_adventure() {
    let encoders = fitted();
    let assembler = FeatureAssembler::new(encoders.clone()).unwrap();

    let mut live = RawSample::new(500);
    live.genres = vec!["Action".to_string(), "Adventure".to_string()];
    let row = assembler.assemble(&live).unwrap();

    let range = encoders
        .schema()
        .segment_range(FeatureField::Genres)
        .unwrap();
    assert_eq!(&row[range], &[1.0, 1.0, 0.0]);
}

#[test]
fn test_length_constant_under_unseen_values() {
    let encoders = fitted();
    let assembler = FeatureAssembler::new(encoders).unwrap();
    let expected = assembler.width();

    let mut unseen = movie(77, &["Western", "Musical"], "NC-17", 2, 29);
    unseen.studios = vec!["Studio Nobody Has Heard Of".to_string()];
    unseen.cast = (0..40).map(|i| format!("Extra {i}")).collect();

    let partial = RawSample::new(78);

    for sample in [&unseen, &partial] {
        let row = assembler.assemble(sample).unwrap();
        assert_eq!(row.len(), expected);
    }
}

#[test]
fn test_train_and_serve_vectors_agree() {
    let samples = training_samples();
    let encoders = fitted();
    let assembler = FeatureAssembler::new(encoders.clone()).unwrap();
    let batch = assembler.assemble_batch(&samples).unwrap();

    // A freshly loaded copy of the encoders must produce identical rows
    let json = serde_json::to_string(encoders.as_ref()).unwrap();
    let reloaded: FittedEncoderSet = serde_json::from_str(&json).unwrap();
    let serving = FeatureAssembler::new(Arc::new(reloaded)).unwrap();

    for (sample, row) in samples.iter().zip(&batch) {
        assert_eq!(&serving.assemble(sample).unwrap(), row);
    }
}

#[test]
fn test_one_hot_and_multi_hot_decode_round_trip() {
    let encoders = fitted();
    let assembler = FeatureAssembler::new(encoders.clone()).unwrap();
    let sample = movie(9, &["Drama", "Action"], "R", 11, 22);
    let row = assembler.assemble(&sample).unwrap();
    let schema = encoders.schema();

    let genres = encoders
        .genres()
        .decode(&row[schema.segment_range(FeatureField::Genres).unwrap()]);
    assert_eq!(
        genres.into_iter().collect::<Vec<_>>(),
        vec!["Action".to_string(), "Drama".to_string()]
    );

    let rating = encoders
        .rating()
        .decode(&row[schema.segment_range(FeatureField::Rating).unwrap()]);
    assert_eq!(rating.map(String::as_str), Some("R"));

    let month = encoders
        .month()
        .decode(&row[schema.segment_range(FeatureField::Month).unwrap()]);
    assert_eq!(month, Some(&11));
}

#[test]
fn test_scaled_training_rows_stay_in_unit_range() {
    let samples = training_samples();
    let assembler = FeatureAssembler::new(fitted()).unwrap();
    let rows = assembler.assemble_batch(&samples).unwrap();
    let scaler = FeatureScaler::fit(&rows).unwrap();

    for row in scaler.transform_batch(&rows).unwrap() {
        assert_eq!(row.len(), assembler.width());
        assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn test_column_groups_cover_every_column() {
    let encoders = fitted();
    let groups = encoders.schema().column_groups();
    let covered: usize = groups.iter().map(|g| g.count()).sum();
    assert_eq!(covered, encoders.column_names().len());
    assert_eq!(groups[0].field, FeatureField::Budget);
}
