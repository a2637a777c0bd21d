//! End-to-end scenarios for normalization and sprite building, driven
//! through the scripted engine

use std::sync::Arc;

use crate::builder::build_sprite;
use crate::error::SpriteError;
use crate::normalize::{normalize, ClipOutcome};
use crate::tests::fixtures::{ClipTree, EngineCall, FakeEngine};

fn dir_is_empty(path: &std::path::Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn test_normalize_empty_directory_writes_nothing() {
    let tree = ClipTree::new();
    let engine = Arc::new(FakeEngine::new());

    let report = normalize(engine.clone(), &tree.paths.input_dir, &tree.paths.normalized_dir, 1)
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(engine.calls().is_empty());
    assert!(dir_is_empty(&tree.paths.normalized_dir));
}

#[tokio::test]
async fn test_normalize_ignores_non_mp3_entries() {
    let tree = ClipTree::new();
    std::fs::write(tree.input("readme.txt"), "x").unwrap();
    std::fs::write(tree.input("take.wav"), "x").unwrap();
    std::fs::create_dir(tree.input("folder.mp3")).unwrap();
    let engine = Arc::new(FakeEngine::new());

    let report = normalize(engine.clone(), &tree.paths.input_dir, &tree.paths.normalized_dir, 1)
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_normalize_missing_input_dir() {
    let tree = ClipTree::new();
    let missing = tree.root.path().join("nope");
    let err = normalize(
        Arc::new(FakeEngine::new()),
        &missing,
        &tree.paths.normalized_dir,
        1,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SpriteError::Filesystem { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_normalize_missing_input_dir_creates_no_output_dir() {
    let tree = ClipTree::new();
    let output_dir = tree.root.path().join("fresh/normalized");

    let err = normalize(
        Arc::new(FakeEngine::new()),
        &tree.root.path().join("nope"),
        &output_dir,
        1,
    )
    .await
    .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(!output_dir.exists());
    assert!(!tree.root.path().join("fresh").exists());
}

#[tokio::test]
async fn test_normalize_creates_output_dir_and_pads_to_whole_seconds() {
    let tree = ClipTree::new();
    tree.touch_inputs(&["b.mp3", "a.mp3", "explosion-big.MP3"]);
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.input("a.mp3"), 1300.0)
            .with_duration(tree.input("b.mp3"), 2000.0)
            .with_duration(tree.input("explosion-big.MP3"), 640.2),
    );
    let output_dir = tree.root.path().join("deep/normalized");

    let report = normalize(engine.clone(), &tree.paths.input_dir, &output_dir, 1)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(
        engine.normalized_targets(),
        vec![
            ("a.mp3".to_string(), 2),
            ("b.mp3".to_string(), 2),
            ("explosion-big.MP3".to_string(), 1),
        ]
    );
    for name in ["a.mp3", "b.mp3", "explosion-big.MP3"] {
        assert!(output_dir.join(name).is_file(), "{name} not written");
    }
    match &report.clips[0].outcome {
        ClipOutcome::Normalized {
            original_ms,
            normalized_ms,
            target_secs,
        } => {
            assert_eq!(*original_ms, 1300.0);
            assert_eq!(*normalized_ms, Some(2000.0));
            assert_eq!(*target_secs, 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_normalize_failure_does_not_stop_batch() {
    let tree = ClipTree::new();
    tree.touch_inputs(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.input("a.mp3"), 500.0)
            .with_duration(tree.input("b.mp3"), 500.0)
            .with_duration(tree.input("c.mp3"), 500.0)
            .failing_probe(tree.input("c.mp3"))
            .with_duration(tree.input("d.mp3"), 500.0)
            .failing_encode("b.mp3"),
    );

    let report = normalize(engine.clone(), &tree.paths.input_dir, &tree.paths.normalized_dir, 1)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 2);
    // b fails first in sorted order, with an encode error
    assert_eq!(report.first_failure().map(|e| e.exit_code()), Some(5));
    assert!(matches!(
        report.clips[2].error(),
        Some(SpriteError::Probe { .. })
    ));
    assert!(tree.normalized("a.mp3").is_file());
    assert!(!tree.normalized("b.mp3").exists());
    assert!(!tree.normalized("c.mp3").exists());
    assert!(tree.normalized("d.mp3").is_file());
}

#[tokio::test]
async fn test_parallel_normalize_reports_in_sorted_order() {
    let tree = ClipTree::new();
    let names = ["f.mp3", "e.mp3", "d.mp3", "c.mp3", "b.mp3", "a.mp3"];
    tree.touch_inputs(&names);
    let engine = names.iter().fold(FakeEngine::new(), |engine, name| {
        engine.with_duration(tree.input(name), 1500.0)
    });

    let report = normalize(
        Arc::new(engine),
        &tree.paths.input_dir,
        &tree.paths.normalized_dir,
        3,
    )
    .await
    .unwrap();

    let order: Vec<String> = report
        .clips
        .iter()
        .map(|c| crate::files::file_name(&c.input))
        .collect();
    assert_eq!(
        order,
        vec!["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3", "f.mp3"]
    );
    assert_eq!(report.succeeded(), 6);
}

#[tokio::test]
async fn test_build_empty_directory_writes_nothing() {
    let tree = ClipTree::new();
    let engine = Arc::new(FakeEngine::new());

    let outcome = build_sprite(engine.clone(), &tree.paths).await.unwrap();

    assert!(outcome.is_none());
    assert!(engine.calls().is_empty());
    assert!(!tree.paths.output_path.exists());
    assert!(!tree.paths.sprite_map_path.exists());
}

#[tokio::test]
async fn test_build_missing_normalized_dir() {
    let tree = ClipTree::new();
    let mut paths = tree.paths.clone();
    paths.normalized_dir = tree.root.path().join("absent");

    let err = build_sprite(Arc::new(FakeEngine::new()), &paths)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_build_two_clips() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["b.mp3", "a.mp3"]);
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.normalized("a.mp3"), 2000.0)
            .with_duration(tree.normalized("b.mp3"), 2000.0)
            .with_duration(tree.input("a.mp3"), 1300.0)
            .with_duration(tree.input("b.mp3"), 2000.0),
    );

    let outcome = build_sprite(engine.clone(), &tree.paths)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.clip_count, 2);
    assert_eq!(outcome.total_ms, 4000.0);

    let written = std::fs::read_to_string(&tree.paths.sprite_map_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json, serde_json::json!({"a": [0, 1300], "b": [2000, 2000]}));
    assert!(written.starts_with("{\n  \"a\": [\n    0,\n    1300\n  ],"));

    match engine.concat_calls().as_slice() {
        [EngineCall::Concat { inputs, output }] => {
            assert_eq!(inputs, &vec![tree.normalized("a.mp3"), tree.normalized("b.mp3")]);
            // encoded beside the target, then renamed over it
            assert_eq!(output.parent(), tree.paths.output_path.parent());
            assert_ne!(output, &tree.paths.output_path);
        }
        other => panic!("unexpected concat calls {other:?}"),
    }
    assert_eq!(std::fs::read_to_string(&tree.paths.output_path).unwrap(), "2");

    let mut results: Vec<String> = std::fs::read_dir(tree.root.path().join("results"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    results.sort();
    assert_eq!(results, vec!["sound_effects.mp3", "spritemap.json"]);
}

#[tokio::test]
async fn test_build_probe_failure_aborts_before_concat() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["a.mp3", "b.mp3"]);
    // b.mp3 has no original to probe
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.normalized("a.mp3"), 1000.0)
            .with_duration(tree.normalized("b.mp3"), 1000.0)
            .with_duration(tree.input("a.mp3"), 900.0),
    );

    let err = build_sprite(engine.clone(), &tree.paths)
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 4);
    assert!(engine.concat_calls().is_empty());
    assert!(!tree.paths.output_path.exists());
    assert!(!tree.paths.sprite_map_path.exists());
}

#[tokio::test]
async fn test_build_concat_failure_keeps_previous_outputs() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["a.mp3"]);
    std::fs::create_dir_all(tree.root.path().join("results")).unwrap();
    std::fs::write(&tree.paths.sprite_map_path, "{\"old\": [0, 1]}").unwrap();
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.normalized("a.mp3"), 1000.0)
            .with_duration(tree.input("a.mp3"), 900.0)
            .failing_concat(),
    );

    let err = build_sprite(engine, &tree.paths).await.unwrap_err();

    assert!(matches!(err, SpriteError::Encode { .. }));
    assert_eq!(
        std::fs::read_to_string(&tree.paths.sprite_map_path).unwrap(),
        "{\"old\": [0, 1]}"
    );
}

#[tokio::test]
async fn test_build_unwritable_sprite_map_keeps_previous_audio() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["a.mp3"]);
    std::fs::create_dir_all(tree.root.path().join("results")).unwrap();
    std::fs::write(&tree.paths.output_path, "old audio").unwrap();
    let blocker = tree.root.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let mut paths = tree.paths.clone();
    paths.sprite_map_path = blocker.join("spritemap.json");

    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.normalized("a.mp3"), 1000.0)
            .with_duration(tree.input("a.mp3"), 900.0),
    );

    let err = build_sprite(engine.clone(), &paths).await.unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(engine.concat_calls().is_empty());
    assert_eq!(
        std::fs::read_to_string(&tree.paths.output_path).unwrap(),
        "old audio"
    );
    let results = std::fs::read_dir(tree.root.path().join("results")).unwrap().count();
    assert_eq!(results, 1);
}

#[tokio::test]
async fn test_build_concat_failure_removes_staged_outputs() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["a.mp3"]);
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.normalized("a.mp3"), 1000.0)
            .with_duration(tree.input("a.mp3"), 900.0)
            .failing_concat(),
    );

    build_sprite(engine, &tree.paths).await.unwrap_err();

    assert!(dir_is_empty(&tree.root.path().join("results")));
}

#[tokio::test]
async fn test_build_colliding_ids_keep_first_position() {
    let tree = ClipTree::new();
    tree.touch_normalized(&["a-b.mp3", "a_b.mp3", "z.mp3"]);
    let engine = ["a-b.mp3", "a_b.mp3", "z.mp3"]
        .iter()
        .fold(FakeEngine::new(), |engine, name| {
            engine
                .with_duration(tree.normalized(name), 1000.0)
                .with_duration(tree.input(name), 400.0)
        });

    let outcome = build_sprite(Arc::new(engine), &tree.paths)
        .await
        .unwrap()
        .unwrap();

    let keys: Vec<&str> = outcome.map.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a_b", "z"]);
    assert_eq!(outcome.map.get("a_b").unwrap().start_ms, 1000);
    assert_eq!(outcome.map.get("z").unwrap().start_ms, 2000);
}

#[cfg(unix)]
#[tokio::test]
async fn test_non_utf8_clip_names_survive_normalize_and_build() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tree = ClipTree::new();
    let name = OsStr::from_bytes(b"\xff.mp3");
    let input = tree.paths.input_dir.join(name);
    std::fs::write(&input, b"ID3").unwrap();
    let engine = Arc::new(FakeEngine::new().with_duration(&input, 1300.0));

    let report = normalize(engine.clone(), &tree.paths.input_dir, &tree.paths.normalized_dir, 1)
        .await
        .unwrap();
    assert_eq!(report.succeeded(), 1);
    let normalized = tree.paths.normalized_dir.join(name);
    assert_eq!(report.clips[0].output, normalized);
    assert!(normalized.is_file());
    assert!(!tree.normalized("\u{FFFD}.mp3").exists());

    let outcome = build_sprite(engine, &tree.paths).await.unwrap().unwrap();
    assert_eq!(outcome.clip_count, 1);
    assert_eq!(outcome.map.get("\u{FFFD}").map(|e| e.duration_ms), Some(1300));
}

#[tokio::test]
async fn test_normalize_then_build() {
    let tree = ClipTree::new();
    tree.touch_inputs(&["laser.mp3", "explosion-big.mp3", "coin.mp3"]);
    // Encoders report slightly more than the padded length
    let engine = Arc::new(
        FakeEngine::new()
            .with_duration(tree.input("coin.mp3"), 310.5)
            .with_duration(tree.input("explosion-big.mp3"), 2450.0)
            .with_duration(tree.input("laser.mp3"), 1000.0)
            .with_normalize_overshoot(26.1),
    );

    let report = normalize(engine.clone(), &tree.paths.input_dir, &tree.paths.normalized_dir, 2)
        .await
        .unwrap();
    assert_eq!(report.failed(), 0);

    let outcome = build_sprite(engine, &tree.paths).await.unwrap().unwrap();
    let entries: Vec<(String, u64, u64)> = outcome
        .map
        .iter()
        .map(|(k, e)| (k.to_string(), e.start_ms, e.duration_ms))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("coin".to_string(), 0, 311),
            ("explosion_big".to_string(), 1027, 2450),
            ("laser".to_string(), 4053, 1000),
        ]
    );
}
