use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn record(width: u32, id: Option<&str>) -> NativeRasterInput {
    NativeRasterInput {
        width,
        height: 1,
        data_b64: String::new(),
        id: id.map(str::to_string),
    }
}

#[test]
fn preserves_identifier_order_and_fills_missing_ids() {
    let fetch = |id: &str| -> anyhow::Result<NativeRasterInput> {
        let width: u32 = id.trim_start_matches('f').parse()?;
        Ok(record(width, None))
    };

    let ids = ["f3", "f1", "f2", "f10"];
    let frames = load_frames(&ids, &fetch).unwrap();

    let widths: Vec<u32> = frames.iter().map(|f| f.width).collect();
    assert_eq!(widths, vec![3, 1, 2, 10]);
    let labels: Vec<&str> = frames.iter().map(|f| f.label()).collect();
    assert_eq!(labels, ids.to_vec());
}

#[test]
fn keeps_record_supplied_id() {
    let fetch = |_: &str| -> anyhow::Result<NativeRasterInput> { Ok(record(1, Some("inner"))) };
    let frames = load_frames(&["outer"], &fetch).unwrap();
    assert_eq!(frames[0].id.as_deref(), Some("inner"));
}

#[test]
fn fails_fast_on_first_unresolved_identifier() {
    let calls = AtomicUsize::new(0);
    let fetch = |id: &str| -> anyhow::Result<NativeRasterInput> {
        calls.fetch_add(1, Ordering::SeqCst);
        if id.starts_with("missing") {
            anyhow::bail!("no such frame");
        }
        Ok(record(1, None))
    };

    let err = load_frames(&["a", "missing-1", "b", "missing-2"], &fetch).unwrap_err();
    match err {
        ReelError::SourceUnavailable { id, reason } => {
            assert_eq!(id, "missing-1");
            assert!(reason.contains("no such frame"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(calls.load(Ordering::SeqCst) >= 2);
}

#[test]
fn invalid_records_and_empty_ids_are_unavailable() {
    let fetch = |_: &str| -> anyhow::Result<NativeRasterInput> { Ok(record(0, None)) };
    assert!(matches!(
        load_frames(&["zero"], &fetch),
        Err(ReelError::SourceUnavailable { .. })
    ));

    let ok = |_: &str| -> anyhow::Result<NativeRasterInput> { Ok(record(1, None)) };
    assert!(matches!(
        load_frames(&["a", " "], &ok),
        Err(ReelError::SourceUnavailable { .. })
    ));
}

#[test]
fn empty_identifier_list_loads_nothing() {
    let ok = |_: &str| -> anyhow::Result<NativeRasterInput> { Ok(record(1, None)) };
    let ids: [&str; 0] = [];
    assert!(load_frames(&ids, &ok).unwrap().is_empty());
}

#[test]
fn dir_fetcher_reads_json_records() {
    let dir = std::env::temp_dir().join(format!("rasterreel_source_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("frame_a.json"),
        r#"{"width":3,"height":2,"data_b64":"eJyLBgAAjACM"}"#,
    )
    .unwrap();

    let fetcher = DirFetcher::new(&dir);
    assert_eq!(fetcher.root(), dir.as_path());
    assert_eq!(fetcher.path_for("frame_a"), dir.join("frame_a.json"));

    let frames = load_frames(&["frame_a"], &fetcher).unwrap();
    assert_eq!(frames[0].width, 3);
    assert_eq!(frames[0].height, 2);
    assert_eq!(frames[0].id.as_deref(), Some("frame_a"));

    let err = load_frames(&["frame_a", "frame_b"], &fetcher).unwrap_err();
    assert!(matches!(err, ReelError::SourceUnavailable { ref id, .. } if id == "frame_b"));

    let _ = std::fs::remove_dir_all(&dir);
}
