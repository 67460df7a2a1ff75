//! End-to-end crawl scenarios
//!
//! These tests run the crawl controller against a mock registry site and
//! check records, checkpoints, and exports on disk.

use crate::support::{
    checkpoint_path, codes, comuna, region, school_page_with_cell_enrollment, test_config,
    MockComuna, MockSchool, MockSite, RecordingSink, RecordingStore,
};
use mineduc_harvest::browser::DriverError;
use mineduc_harvest::config::Config;
use mineduc_harvest::crawler::{CrawlOptions, CrawlReport, CrawlScope, Crawler};
use mineduc_harvest::output::{read_records, ExportKind};
use mineduc_harvest::state::CrawlCursor;
use mineduc_harvest::storage::{CheckpointStore, JsonCheckpointStore};
use mineduc_harvest::{ScraperError, StopSignal, TerminationOutcome};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn run(site: MockSite, config: Config, options: CrawlOptions) -> Result<CrawlReport, ScraperError> {
    Crawler::new(site, config, options).unwrap().run()
}

fn load_checkpoint(config: &Config) -> CrawlCursor {
    let path = checkpoint_path(config);
    JsonCheckpointStore::new(&path)
        .load(&path)
        .unwrap()
        .expect("checkpoint should exist")
}

fn rows(path: &str) -> usize {
    read_records(Path::new(path)).unwrap().len()
}

#[test]
fn test_full_crawl_single_region() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "15",
        "Región de Arica y Parinacota",
        vec![
            comuna::<&str>("15101", "Arica", &[]),
            comuna("15102", "Camarones", &["101", "102", "103"]),
        ],
    )]);
    let activity = site.activity();

    let report = run(site, config.clone(), CrawlOptions::default()).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.records.len(), 3);
    for record in &report.records {
        assert_eq!(record.region, "Región de Arica y Parinacota");
        assert_eq!(record.comuna, "Camarones");
    }

    let first = &report.records[0];
    assert_eq!(first.name.as_deref(), Some("Escuela 101"));
    assert_eq!(first.phone.as_deref(), Some("+56 2 2345 6789"));
    assert_eq!(first.director.as_deref(), Some("María Pérez"));
    assert_eq!(first.total_enrollment.as_deref(), Some("420"));
    assert_eq!(first.website, None);
    assert_eq!(
        first.source_url,
        "https://mi.mineduc.cl/mime-web/mvc/mime/ficha?rbd=101"
    );

    assert_eq!(rows(&config.output.export_path), 3);
    assert_eq!(
        report.export_path.as_deref(),
        Some(Path::new(&config.output.export_path))
    );
    assert!(!checkpoint_path(&config).exists());
    assert_eq!(activity.borrow().quit_calls, 1);
}

#[test]
fn test_sentinel_options_are_never_selected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![
        region("1", "Región de Tarapacá", vec![comuna("1101", "Iquique", &["1"])]),
        region("2", "Región de Antofagasta", vec![comuna("2101", "Antofagasta", &["2"])]),
    ]);
    let activity = site.activity();

    let report = run(site, config, CrawlOptions::default()).unwrap();

    assert_eq!(report.counters.regions_processed, 2);
    assert_eq!(report.counters.regions_skipped, 0);
    assert_eq!(report.counters.comunas_skipped, 0);
    assert_eq!(activity.borrow().searches, vec!["Iquique", "Antofagasta"]);
}

#[test]
fn test_checkpoint_every_ten_records() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "13",
        "Región Metropolitana",
        vec![
            comuna("13101", "Santiago", &codes(100, 7)),
            comuna("13102", "Cerrillos", &codes(200, 18)),
        ],
    )]);

    let store = RecordingStore::new(&config);
    let saves = store.saves.clone();
    let sink = RecordingSink::new(&config);
    let exports = sink.exports.clone();

    let report = Crawler::new(site, config.clone(), CrawlOptions::default())
        .unwrap()
        .with_checkpoint_store(Box::new(store))
        .with_record_sink(Box::new(sink))
        .run()
        .unwrap();

    assert_eq!(report.records.len(), 25);
    assert_eq!(*saves.borrow(), vec![10, 20]);
    assert_eq!(
        *exports.borrow(),
        vec![
            (ExportKind::Intermediate, 10),
            (ExportKind::Intermediate, 20),
            (ExportKind::Final, 25),
        ]
    );

    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.records_collected, 20);
    assert_eq!(cursor.current_region.as_deref(), Some("Región Metropolitana"));
    assert_eq!(cursor.current_comuna.as_deref(), Some("Cerrillos"));
    assert!(cursor.config_hash.is_some());

    assert_eq!(rows(&config.output.intermediate_export_path), 20);
    assert_eq!(rows(&config.output.export_path), 25);
}

fn four_comunas(region_id: &str, prefix: &str, base: usize) -> Vec<MockComuna> {
    (1..=4)
        .map(|n| {
            comuna(
                &format!("{}{}", region_id, n),
                &format!("{}{}", prefix, n),
                &codes(base + n * 10, 1),
            )
        })
        .collect()
}

#[test]
fn test_resume_skips_to_cursor() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![
        region("1", "R1", four_comunas("1", "A", 1000)),
        region("2", "R2", four_comunas("2", "C", 2000)),
        region("3", "R3", four_comunas("3", "E", 3000)),
    ]);
    let activity = site.activity();

    let mut store = JsonCheckpointStore::new(checkpoint_path(&config));
    store
        .save(&CrawlCursor::new(Some("R2".to_string()), Some("C3".to_string()), 0))
        .unwrap();

    let options = CrawlOptions {
        resume: Some(checkpoint_path(&config)),
        ..CrawlOptions::default()
    };
    let report = run(site, config, options).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(
        activity.borrow().searches,
        vec!["C3", "C4", "E1", "E2", "E3", "E4"]
    );
    assert_eq!(report.records.len(), 6);
    assert!(report.records.iter().all(|r| r.region != "R1"));
}

#[test]
fn test_resume_at_region_granularity() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![
        region("1", "R1", four_comunas("1", "A", 1000)),
        region("2", "R2", four_comunas("2", "C", 2000)),
    ]);
    let activity = site.activity();

    let mut store = JsonCheckpointStore::new(checkpoint_path(&config));
    store
        .save(&CrawlCursor::new(Some("R2".to_string()), None, 0))
        .unwrap();

    let options = CrawlOptions {
        resume: Some(checkpoint_path(&config)),
        ..CrawlOptions::default()
    };
    run(site, config, options).unwrap();

    assert_eq!(activity.borrow().searches, vec!["C1", "C2", "C3", "C4"]);
}

#[test]
fn test_missing_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "1",
        "R1",
        vec![comuna("11", "A", &["1", "2"]), comuna("12", "B", &["3"])],
    )]);

    let options = CrawlOptions {
        resume: Some(dir.path().join("does_not_exist.json")),
        ..CrawlOptions::default()
    };
    let report = run(site, config, options).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.records.len(), 3);
}

#[test]
fn test_malformed_checkpoint_is_reported_before_crawling() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let path = checkpoint_path(&config);
    fs::write(&path, "{\"currentRegion\": ").unwrap();

    let site = MockSite::new(vec![region("1", "R1", vec![comuna("11", "A", &["1"])])]);
    let activity = site.activity();

    let options = CrawlOptions {
        resume: Some(path.clone()),
        ..CrawlOptions::default()
    };
    let result = run(site, config, options);

    assert!(matches!(result, Err(ScraperError::Checkpoint(_))));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{\"currentRegion\": ");
    assert!(activity.borrow().searches.is_empty());
    assert_eq!(activity.borrow().quit_calls, 1);
}

#[test]
fn test_interrupt_preserves_progress() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let stop = StopSignal::new();
    let site = MockSite::new(vec![region(
        "5",
        "Región de Valparaíso",
        vec![
            comuna("5101", "Valparaíso", &codes(100, 12)),
            comuna("5109", "Viña del Mar", &codes(200, 12)),
        ],
    )])
    .with_stop_after(15, stop.clone());

    let options = CrawlOptions {
        stop,
        ..CrawlOptions::default()
    };
    let report = run(site, config.clone(), options).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::Interrupted);
    assert_eq!(report.records.len(), 15);

    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.records_collected, 15);
    assert_eq!(cursor.current_comuna.as_deref(), Some("Viña del Mar"));
    assert_eq!(rows(&config.output.intermediate_export_path), 15);
    assert!(!Path::new(&config.output.export_path).exists());
}

#[test]
fn test_resume_after_interrupt_carries_records_over() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let hierarchy = || {
        vec![region(
            "5",
            "Región de Valparaíso",
            vec![
                comuna("5101", "Valparaíso", &codes(100, 10)),
                comuna("5109", "Viña del Mar", &codes(200, 10)),
            ],
        )]
    };

    let stop = StopSignal::new();
    let first = MockSite::new(hierarchy()).with_stop_after(15, stop.clone());
    let interrupted = run(
        first,
        config.clone(),
        CrawlOptions {
            stop,
            ..CrawlOptions::default()
        },
    )
    .unwrap();
    assert_eq!(interrupted.outcome, TerminationOutcome::Interrupted);
    assert_eq!(interrupted.records.len(), 15);

    let second = MockSite::new(hierarchy());
    let activity = second.activity();
    let resumed = run(
        second,
        config.clone(),
        CrawlOptions {
            resume: Some(checkpoint_path(&config)),
            ..CrawlOptions::default()
        },
    )
    .unwrap();

    assert_eq!(resumed.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(activity.borrow().searches, vec!["Viña del Mar"]);
    assert_eq!(resumed.records.len(), 20);

    let urls: HashSet<&str> = resumed
        .records
        .iter()
        .map(|r| r.source_url.as_str())
        .collect();
    assert_eq!(urls.len(), 20);
    assert_eq!(rows(&config.output.export_path), 20);
}

#[test]
fn test_lost_session_fails_after_preserving_state() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "8",
        "Región del Biobío",
        vec![comuna("8101", "Concepción", &codes(100, 6))],
    )])
    .with_session_dying_at("104");
    let activity = site.activity();

    let result = run(site, config.clone(), CrawlOptions::default());

    assert!(matches!(
        result,
        Err(ScraperError::Driver(DriverError::SessionClosed))
    ));

    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.records_collected, 4);
    assert_eq!(cursor.current_comuna.as_deref(), Some("Concepción"));
    assert_eq!(rows(&config.output.intermediate_export_path), 4);
    assert!(!Path::new(&config.output.export_path).exists());
    assert_eq!(activity.borrow().quit_calls, 1);
}

#[test]
fn test_unreachable_school_is_skipped() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "9",
        "Región de La Araucanía",
        vec![comuna("9101", "Temuco", &["1", "2", "3"])],
    )])
    .with_unreachable("2");

    let report = run(site, config, CrawlOptions::default()).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.counters.schools_failed, 1);
    assert!(report.records.iter().all(|r| !r.source_url.ends_with("rbd=2")));
}

#[test]
fn test_enrollment_falls_back_to_table_cell() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut temuco = comuna::<&str>("9101", "Temuco", &[]);
    temuco.schools.push(MockSchool {
        code: "77".to_string(),
        html: school_page_with_cell_enrollment("Liceo Pablo Neruda", "512"),
    });
    let site = MockSite::new(vec![region("9", "Región de La Araucanía", vec![temuco])]);

    let report = run(site, config, CrawlOptions::default()).unwrap();

    let record = &report.records[0];
    assert_eq!(record.name.as_deref(), Some("Liceo Pablo Neruda"));
    assert_eq!(record.total_enrollment.as_deref(), Some("512"));
    assert_eq!(record.phone, None);
    assert_eq!(record.address, None);
}

#[test]
fn test_pilot_covers_first_comuna_only() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![
        region(
            "15",
            "Región de Arica y Parinacota",
            vec![
                comuna("15101", "Arica", &codes(100, 12)),
                comuna("15102", "Camarones", &["200"]),
            ],
        ),
        region("1", "Región de Tarapacá", vec![comuna("1101", "Iquique", &["300"])]),
    ]);
    let activity = site.activity();

    let options = CrawlOptions {
        scope: CrawlScope::Pilot,
        ..CrawlOptions::default()
    };
    let report = run(site, config.clone(), options).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.records.len(), 12);
    assert_eq!(activity.borrow().searches, vec!["Arica"]);

    assert_eq!(rows(&config.output.pilot_export_path), 12);
    assert!(!checkpoint_path(&config).exists());
    assert!(!Path::new(&config.output.intermediate_export_path).exists());
    assert!(!Path::new(&config.output.export_path).exists());
}

#[test]
fn test_stop_before_resume_point_keeps_cursor() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let hierarchy = || {
        vec![
            region("1", "R1", vec![comuna("11", "A", &codes(100, 5))]),
            region("2", "R2", vec![comuna("21", "C", &codes(200, 10))]),
        ]
    };
    let resume = || CrawlOptions {
        resume: Some(checkpoint_path(&config)),
        ..CrawlOptions::default()
    };

    let stop = StopSignal::new();
    let first = MockSite::new(hierarchy()).with_stop_after(12, stop.clone());
    run(first, config.clone(), CrawlOptions { stop, ..CrawlOptions::default() }).unwrap();
    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.current_region.as_deref(), Some("R2"));
    assert_eq!(cursor.current_comuna.as_deref(), Some("C"));
    assert_eq!(cursor.records_collected, 12);

    // Stopped again before the crawl reaches R2
    let stopped = StopSignal::new();
    stopped.trigger();
    let second = MockSite::new(hierarchy());
    let report = run(
        second,
        config.clone(),
        CrawlOptions {
            stop: stopped,
            ..resume()
        },
    )
    .unwrap();
    assert_eq!(report.outcome, TerminationOutcome::Interrupted);

    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.current_region.as_deref(), Some("R2"));
    assert_eq!(cursor.current_comuna.as_deref(), Some("C"));
    assert_eq!(cursor.records_collected, 5);
    assert_eq!(rows(&config.output.intermediate_export_path), 5);

    let third = MockSite::new(hierarchy());
    let activity = third.activity();
    let report = run(third, config.clone(), resume()).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(activity.borrow().searches, vec!["C"]);
    assert_eq!(report.records.len(), 15);
    assert_eq!(rows(&config.output.export_path), 15);
}

#[test]
fn test_failed_region_selection_skips_region() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![
        region("1", "R1", vec![comuna("11", "A", &["1"])]),
        region("2", "R2", vec![comuna("21", "B", &["2"])]),
        region("3", "R3", vec![comuna("31", "C", &["3"])]),
    ])
    .with_failing_region("2");
    let activity = site.activity();

    let report = run(site, config, CrawlOptions::default()).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.counters.regions_skipped, 1);
    assert_eq!(report.counters.regions_processed, 2);
    assert_eq!(activity.borrow().searches, vec!["A", "C"]);
    assert_eq!(report.records.len(), 2);
}

#[test]
fn test_failed_search_skips_comuna() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region(
        "7",
        "Región del Maule",
        vec![
            comuna("7101", "Talca", &["1", "2"]),
            comuna("7102", "Constitución", &["3"]),
            comuna("7103", "Curepto", &["4", "5"]),
        ],
    )])
    .with_failing_search("7102");
    let activity = site.activity();

    let report = run(site, config, CrawlOptions::default()).unwrap();

    assert_eq!(report.outcome, TerminationOutcome::CompletedAll);
    assert_eq!(report.counters.comunas_skipped, 1);
    assert_eq!(report.counters.comunas_processed, 2);
    assert_eq!(activity.borrow().searches, vec!["Talca", "Curepto"]);
    assert_eq!(report.records.len(), 4);
    assert!(report.records.iter().all(|r| r.comuna != "Constitución"));
}

#[test]
fn test_unreachable_search_page_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let site = MockSite::new(vec![region("1", "R1", vec![comuna("11", "A", &["1"])])])
        .with_search_page_down();
    let activity = site.activity();

    let result = run(site, config.clone(), CrawlOptions::default());

    assert!(matches!(
        result,
        Err(ScraperError::Driver(DriverError::Navigation { .. }))
    ));
    assert!(activity.borrow().searches.is_empty());
    assert_eq!(activity.borrow().quit_calls, 1);
    assert!(!Path::new(&config.output.export_path).exists());
}

#[test]
fn test_fatal_fault_on_resume_preserves_progress() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let hierarchy = || {
        vec![
            region("1", "R1", vec![comuna("11", "A", &codes(100, 6))]),
            region("2", "R2", vec![comuna("21", "B", &codes(200, 6))]),
        ]
    };

    let stop = StopSignal::new();
    let first = MockSite::new(hierarchy()).with_stop_after(8, stop.clone());
    run(first, config.clone(), CrawlOptions { stop, ..CrawlOptions::default() }).unwrap();

    let second = MockSite::new(hierarchy()).with_search_page_down();
    let activity = second.activity();
    let result = run(
        second,
        config.clone(),
        CrawlOptions {
            resume: Some(checkpoint_path(&config)),
            ..CrawlOptions::default()
        },
    );

    assert!(matches!(result, Err(ScraperError::Driver(_))));
    assert_eq!(activity.borrow().quit_calls, 1);

    let cursor = load_checkpoint(&config);
    assert_eq!(cursor.current_region.as_deref(), Some("R2"));
    assert_eq!(cursor.current_comuna.as_deref(), Some("B"));
    assert_eq!(cursor.records_collected, 6);

    let preserved = read_records(Path::new(&config.output.intermediate_export_path)).unwrap();
    assert_eq!(preserved.len(), 6);
    assert!(preserved.iter().all(|r| r.comuna == "A"));
}
