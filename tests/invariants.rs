use std::sync::Arc;

use serde_json::json;

use sentigrid::{
    BoundedSource, Lexicon, RecordStream, Region, RegionGrid, RunConfig, StreamingSource, filters,
    mappers, run,
};

fn lexicon() -> Arc<Lexicon> {
    Arc::new(Lexicon::from_entries([
        ("good".to_string(), 2),
        ("bad".to_string(), -3),
        ("great".to_string(), 3),
        ("awful".to_string(), -4),
    ]))
}

fn grid() -> Arc<RegionGrid> {
    let cell = |id: &str, xmin: f64, ymin: f64| Region {
        id: id.to_string(),
        xmin,
        xmax: xmin + 10.0,
        ymin,
        ymax: ymin + 10.0,
    };
    Arc::new(RegionGrid::new(vec![
        cell("A1", 0.0, 0.0),
        cell("A2", 10.0, 0.0),
        cell("B1", 0.0, 10.0),
        cell("B2", 10.0, 10.0),
    ]))
}

fn config(lexicon: &Arc<Lexicon>) -> RunConfig {
    RunConfig::new()
        .with_mapper(mappers::lowercase())
        .with_mapper(mappers::strip_trailing_punctuation())
        .with_filter(filters::non_empty())
        .with_filter(filters::in_lexicon(Arc::clone(lexicon)))
}

/// Deterministic corpus spread over all four cells plus strays.
fn corpus(rows: usize) -> String {
    let words = ["good", "bad", "great", "awful", "neutralish"];
    let rows: Vec<_> = (0..rows)
        .map(|idx| {
            let text = format!(
                "{} {}!",
                words[idx % words.len()],
                words[(idx * 3 + 1) % words.len()]
            );
            // Every seventh record lands outside the grid.
            let (x, y) = if idx % 7 == 0 {
                (95.0, 95.0)
            } else {
                ((idx % 2) as f64 * 10.0 + 5.0, ((idx / 2) % 2) as f64 * 10.0 + 5.0)
            };
            json!({"doc": {"text": text, "coordinates": {"coordinates": [x, y]}}})
        })
        .collect();
    serde_json::to_string(&json!({
        "total_rows": rows.len(),
        "offset": 0,
        "rows": rows,
    }))
    .unwrap()
}

#[test]
fn good_bad_in_region_a_scores_minus_one() {
    let lexicon = Arc::new(Lexicon::from_entries([
        ("good".to_string(), 2),
        ("bad".to_string(), -3),
    ]));
    let grid = Arc::new(RegionGrid::new(vec![Region {
        id: "A".to_string(),
        xmin: 0.0,
        xmax: 10.0,
        ymin: 0.0,
        ymax: 10.0,
    }]));
    let source =
        BoundedSource::from_str(r#"[{"text": "good bad", "coordinates": [5, 5]}]"#).unwrap();
    let report = run(source, Arc::clone(&lexicon), grid, config(&lexicon)).unwrap();
    assert_eq!(report.totals["A"], -1);
    assert_eq!(report.unclassified, 0);
}

#[test]
fn far_away_record_leaves_region_a_at_zero() {
    let lexicon = Arc::new(Lexicon::from_entries([
        ("good".to_string(), 2),
        ("bad".to_string(), -3),
    ]));
    let grid = Arc::new(RegionGrid::new(vec![Region {
        id: "A".to_string(),
        xmin: 0.0,
        xmax: 10.0,
        ymin: 0.0,
        ymax: 10.0,
    }]));
    let source =
        BoundedSource::from_str(r#"[{"text": "good bad", "coordinates": [50, 50]}]"#).unwrap();
    let report = run(source, Arc::clone(&lexicon), grid, config(&lexicon)).unwrap();
    assert_eq!(report.totals["A"], 0);
    assert_eq!(report.unclassified, 1);
}

#[test]
fn report_covers_every_region_even_with_no_matching_records() {
    let lexicon = lexicon();
    let source =
        BoundedSource::from_str(r#"[{"text": "good", "coordinates": [5.0, 5.0]}]"#).unwrap();
    let report = run(source, Arc::clone(&lexicon), grid(), config(&lexicon)).unwrap();
    let regions: Vec<&String> = report.totals.keys().collect();
    assert_eq!(regions, ["A1", "A2", "B1", "B2"]);
    assert_eq!(report.totals["A1"], 2);
    assert_eq!(report.totals["B2"], 0);
}

#[test]
fn streaming_and_bounded_sources_yield_identical_sequences() {
    let document = corpus(60);
    let mut bounded = BoundedSource::from_str(&document).unwrap();
    let mut streaming = StreamingSource::from_reader(document.as_bytes()).unwrap();

    assert_eq!(bounded.total(), Some(60));
    assert_eq!(streaming.total(), None);
    loop {
        match (bounded.next_record(), streaming.next_record()) {
            (None, None) => break,
            (Some(Ok(a)), Some(Ok(b))) => assert_eq!(a, b),
            (a, b) => panic!("sequences diverged: {a:?} vs {b:?}"),
        }
    }
}

#[test]
fn worker_count_does_not_change_the_totals() {
    let document = corpus(200);
    let lexicon = lexicon();
    let baseline = run(
        BoundedSource::from_str(&document).unwrap(),
        Arc::clone(&lexicon),
        grid(),
        config(&lexicon).with_worker_count(1),
    )
    .unwrap();

    for workers in [2, 4, 8] {
        let report = run(
            StreamingSource::from_reader(document.as_bytes()).unwrap(),
            Arc::clone(&lexicon),
            grid(),
            config(&lexicon).with_worker_count(workers),
        )
        .unwrap();
        assert_eq!(report, baseline, "diverged at {workers} workers");
    }
}

#[test]
fn malformed_record_amid_good_ones_is_counted_not_fatal() {
    let document = r#"[
        {"text": "good", "coordinates": [5.0, 5.0]},
        {"text": "no geotag on this one"},
        {"text": "bad", "coordinates": [15.0, 5.0]}
    ]"#;
    let lexicon = lexicon();
    for report in [
        run(
            BoundedSource::from_str(document).unwrap(),
            Arc::clone(&lexicon),
            grid(),
            config(&lexicon),
        )
        .unwrap(),
        run(
            StreamingSource::from_reader(document.as_bytes()).unwrap(),
            Arc::clone(&lexicon),
            grid(),
            config(&lexicon),
        )
        .unwrap(),
    ] {
        assert_eq!(report.processed, 2);
        assert_eq!(report.record_errors, 1);
        assert_eq!(report.totals["A1"], 2);
        assert_eq!(report.totals["A2"], -3);
    }
}
