use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use grabmaps_core::{CalibrationRecord, CaptureMargins, GeoRect, PollPolicy, ViewerProfile};
use grabmaps_session::{
    CancelToken, Cell, DirectorySink, GeoRaster, GrabConfig, GrabError, GrabSession, MemorySink,
    SessionState, SessionStatus, SimOptions, StoredTile, Strategy, SyntheticViewer, TileArtifact,
    TileSink,
};

const SCALE: f64 = 1.0 / 1024.0;

fn profile(tile: (u32, u32), overlap: (u32, u32), border: (u32, u32)) -> ViewerProfile {
    ViewerProfile {
        name: "synthetic".to_string(),
        margins: CaptureMargins::new(3, 10, 2, 5),
        border_x: border.0,
        border_y: border.1,
        tile_width: tile.0,
        tile_height: tile.1,
        overlap_x: overlap.0,
        overlap_y: overlap.1,
        steps_per_tile: 2,
        settle: PollPolicy::new(20, 0),
        query: PollPolicy::new(20, 0),
        zoom_settle_ms: 0,
        max_positioning_steps: 500,
    }
}

fn config(viewer: ViewerProfile, zoom_steps: u32) -> GrabConfig {
    GrabConfig {
        map_name: "Test".to_string(),
        zoom_steps,
        viewer,
        ..GrabConfig::default()
    }
}

fn raster() -> GeoRaster {
    GeoRaster::checkerboard(GeoRect::new(50.5, 49.5, 8.5, 7.5), 512, 512, 8)
}

fn direct_viewer(viewer: &ViewerProfile) -> SyntheticViewer {
    SyntheticViewer::new(raster(), viewer.clone(), SimOptions::direct(SCALE, SCALE))
}

fn sampled_viewer(viewer: &ViewerProfile) -> SyntheticViewer {
    let mut options = SimOptions::sampled(SCALE, SCALE);
    options.settle_polls = 1;
    options.query_latency = 1;
    SyntheticViewer::new(raster(), viewer.clone(), options)
}

fn assert_covers(tiles: &[&StoredTile], reference: &GeoRect) {
    let west = tiles.iter().map(|t| t.bounds.west()).fold(f64::INFINITY, f64::min);
    let east = tiles.iter().map(|t| t.bounds.east()).fold(f64::NEG_INFINITY, f64::max);
    let north = tiles.iter().map(|t| t.bounds.north()).fold(f64::NEG_INFINITY, f64::max);
    let south = tiles.iter().map(|t| t.bounds.south()).fold(f64::INFINITY, f64::min);
    assert!(west <= reference.west, "west {west} > {}", reference.west);
    assert!(east >= reference.east, "east {east} < {}", reference.east);
    assert!(north >= reference.north, "north {north} < {}", reference.north);
    assert!(south <= reference.south, "south {south} > {}", reference.south);
}

fn assert_full_grid(tiles: &[&StoredTile], slices_x: u32, slices_y: u32) {
    let cells: Vec<Cell> = tiles.iter().map(|t| t.cell).collect();
    let unique: HashSet<Cell> = cells.iter().copied().collect();
    assert_eq!(cells.len(), unique.len(), "a cell was captured twice");
    let expected: HashSet<Cell> = (0..slices_y)
        .flat_map(|y| (0..slices_x).map(move |x| Cell::new(x, y)))
        .collect();
    assert_eq!(unique, expected);
}

/// Stores into memory and cancels once a given tile is stored.
struct CancelAfter {
    tiles: MemorySink,
    token: CancelToken,
    trigger: (u32, Cell),
}

impl TileSink for CancelAfter {
    fn store(&mut self, tile: &TileArtifact<'_>) -> Result<(), GrabError> {
        self.tiles.store(tile)?;
        if (tile.zoom_step, tile.cell) == self.trigger {
            self.token.cancel();
        }
        Ok(())
    }
}

#[test]
fn direct_grab_addresses_a_row_major_grid() {
    let viewer = profile((40, 30), (23, 17), (4, 3));
    let mut session =
        GrabSession::new(config(viewer.clone(), 1), direct_viewer(&viewer), MemorySink::new()).unwrap();
    let report = session.run().unwrap();

    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(report.levels.len(), 1);
    let level = report.levels[0];
    assert_eq!(level.strategy, Strategy::DirectAddressing);
    assert_eq!((level.slices_x, level.slices_y), (5, 5));
    assert_eq!(level.tiles, 25);
    assert_eq!(report.tiles_written, 26);

    let sink = session.sink();
    let tiles: Vec<&StoredTile> = sink.level(1).collect();
    let order: Vec<Cell> = tiles.iter().map(|t| t.cell).collect();
    let row_major: Vec<Cell> = (0..5).flat_map(|y| (0..5).map(move |x| Cell::new(x, y))).collect();
    assert_eq!(order, row_major);
    assert_covers(&tiles, &report.reference.unwrap().edges());

    let reference = &sink.tiles[0];
    assert_eq!(reference.stem, "Test_0_0_0");
    assert_eq!(reference.calibration.image_file_name, "Test_0_0_0.png");
    assert_eq!(tiles[7].stem, "Test_1_2_1");
    assert!(session.view().stats().released);
}

#[test]
fn cancellation_stops_after_the_current_tile() {
    let viewer = profile((40, 30), (23, 17), (0, 0));
    let token = CancelToken::new();
    let sink = CancelAfter {
        tiles: MemorySink::new(),
        token: token.clone(),
        trigger: (1, Cell::new(2, 1)),
    };
    let mut session = GrabSession::new(config(viewer.clone(), 2), direct_viewer(&viewer), sink)
        .unwrap()
        .with_cancel_token(token);
    let report = session.run().unwrap();

    assert_eq!(report.status, SessionStatus::Cancelled);
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(report.levels.is_empty());

    let tiles = &session.sink().tiles.tiles;
    let last = tiles.last().unwrap();
    assert_eq!((last.zoom_step, last.cell), (1, Cell::new(2, 1)));
    // Reference, the first row of five and three tiles of the second row.
    assert_eq!(tiles.len(), 9);
    assert_eq!(report.tiles_written, 9);
    assert_eq!(session.view().stats().captures, 9);
    assert_eq!(session.view().zoom(), 1);
    assert!(session.view().stats().released);
}

#[test]
fn serpentine_grab_captures_each_cell_once() {
    let viewer = profile((48, 32), (16, 8), (0, 0));
    let mut session =
        GrabSession::new(config(viewer.clone(), 2), sampled_viewer(&viewer), MemorySink::new()).unwrap();
    let report = session.run().unwrap();
    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.levels.len(), 2);
    let reference = report.reference.unwrap().edges();

    for level in &report.levels {
        assert_eq!(level.strategy, Strategy::Serpentine);
        let tiles: Vec<&StoredTile> = session.sink().level(level.zoom_step).collect();
        assert_eq!(tiles.len() as u32, level.tiles);
        assert_eq!(level.tiles, level.slices_x * level.slices_y);
        assert!(level.slices_x >= 2 && level.slices_y >= 2, "{level:?}");
        assert_full_grid(&tiles, level.slices_x, level.slices_y);
        assert_covers(&tiles, &reference);
        // One tile step per new tile, two native pans per step.
        assert!(level.pans >= 2 * (level.tiles as u64 - 1));

        // Every column sits at one longitude and every row at one latitude,
        // whichever way the walk reached it.
        let at = |c: Cell| tiles.iter().find(|t| t.cell == c).unwrap().bounds;
        for t in &tiles {
            let column_top = at(Cell::new(t.cell.x, 0));
            let row_start = at(Cell::new(0, t.cell.y));
            assert!((t.bounds.west() - column_top.west()).abs() < 1e-9);
            assert!((t.bounds.north() - row_start.north()).abs() < 1e-9);
        }
    }
    assert_eq!(session.view().zoom(), 2);
}

fn cancelled_serpentine_grab(trigger: Cell) -> (GrabSession<SyntheticViewer, CancelAfter>, SessionStatus) {
    let viewer = profile((48, 32), (16, 8), (0, 0));
    let token = CancelToken::new();
    let sink = CancelAfter {
        tiles: MemorySink::new(),
        token: token.clone(),
        trigger: (1, trigger),
    };
    let mut session = GrabSession::new(config(viewer.clone(), 2), sampled_viewer(&viewer), sink)
        .unwrap()
        .with_cancel_token(token);
    let report = session.run().unwrap();
    assert!(report.levels.is_empty());
    assert_eq!(report.tiles_written as usize, session.sink().tiles.tiles.len());
    (session, report.status)
}

#[test]
fn cancellation_during_discovery_stops_the_sweep() {
    let (session, status) = cancelled_serpentine_grab(Cell::new(0, 1));
    assert_eq!(status, SessionStatus::Cancelled);
    assert_eq!(session.state(), SessionState::Cancelled);

    let cells: Vec<(u32, Cell)> = session
        .sink()
        .tiles
        .tiles
        .iter()
        .map(|t| (t.zoom_step, t.cell))
        .collect();
    assert_eq!(
        cells,
        [(0, Cell::new(0, 0)), (1, Cell::new(0, 0)), (1, Cell::new(0, 1))]
    );
    assert_eq!(session.view().zoom(), 1);
    assert!(session.view().stats().released);
}

#[test]
fn cancellation_during_serpentine_stops_after_the_current_tile() {
    // Sizes of the first level when nothing interrupts it.
    let viewer = profile((48, 32), (16, 8), (0, 0));
    let mut full =
        GrabSession::new(config(viewer.clone(), 1), sampled_viewer(&viewer), MemorySink::new()).unwrap();
    let level = full.run().unwrap().levels[0];
    let (m, n) = (level.slices_x, level.slices_y);
    assert!(m >= 2 && n >= 2, "{level:?}");

    // The first cell the serpentine visits once discovery is done.
    let (session, status) = cancelled_serpentine_grab(Cell::new(m - 1, n - 2));
    assert_eq!(status, SessionStatus::Cancelled);
    assert_eq!(session.state(), SessionState::Cancelled);

    let tiles = &session.sink().tiles.tiles;
    let last = tiles.last().unwrap();
    assert_eq!((last.zoom_step, last.cell), (1, Cell::new(m - 1, n - 2)));
    // Reference, column 0, the rest of the bottom row, then one tile.
    assert_eq!(tiles.len() as u32, 1 + n + (m - 1) + 1);
    let unique: HashSet<(u32, Cell)> = tiles.iter().map(|t| (t.zoom_step, t.cell)).collect();
    assert_eq!(unique.len(), tiles.len());
    assert!(tiles.iter().all(|t| t.zoom_step <= 1));
    assert_eq!(session.view().zoom(), 1);
    assert!(session.view().stats().released);
}

#[test]
fn directory_sink_writes_calibrated_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let viewer = profile((40, 30), (10, 10), (2, 2));
    let mut cfg = config(viewer.clone(), 1);
    cfg.map_folder = dir.path().join("out");
    let sink = DirectorySink::create(&cfg.map_folder).unwrap();
    let mut session = GrabSession::new(cfg, direct_viewer(&viewer), sink).unwrap();
    let report = session.run().unwrap();

    let folder = session.sink().folder().to_path_buf();
    let pngs = std::fs::read_dir(&folder)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
        .count();
    assert_eq!(pngs as u32, report.tiles_written);

    let record = CalibrationRecord::read_file(folder.join("Test_1_0_0.gdm")).unwrap();
    assert_eq!(record.image_file_name, "Test_1_0_0.png");
    assert_eq!(record.zoom_level, 1);
    assert_eq!((record.points[2].x, record.points[2].y), (39, 29));
    let png = image::open(folder.join("Test_1_0_0.png")).unwrap();
    assert_eq!((png.width(), png.height()), (40, 30));
}

#[test]
fn tile_size_mismatch_is_fatal() {
    let rendered = profile((40, 30), (10, 10), (0, 0));
    let expected = profile((41, 30), (10, 10), (0, 0));
    let mut session =
        GrabSession::new(config(expected, 1), direct_viewer(&rendered), MemorySink::new()).unwrap();
    let err = session.run().unwrap_err();
    assert!(matches!(
        err,
        GrabError::DimensionMismatch {
            width: 40,
            expected_width: 41,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.sink().tiles.is_empty());
    let (view, _) = session.into_parts();
    assert!(view.stats().released);
}

#[test]
fn unsettled_viewer_times_out() {
    let mut viewer = profile((40, 30), (10, 10), (0, 0));
    viewer.settle = PollPolicy::new(3, 0);
    let mut options = SimOptions::direct(SCALE, SCALE);
    options.settle_polls = 10;
    let view = SyntheticViewer::new(raster(), viewer.clone(), options);
    let mut session = GrabSession::new(config(viewer, 1), view, MemorySink::new()).unwrap();
    assert!(matches!(
        session.run(),
        Err(GrabError::SettleTimeout { attempts: 3 })
    ));
}

#[test]
fn zero_zoom_steps_capture_only_the_reference() {
    let viewer = profile((40, 30), (10, 10), (0, 0));
    let mut cfg = config(viewer.clone(), 0);
    cfg.initial_zoom = 3;
    let mut session = GrabSession::new(cfg, direct_viewer(&viewer), MemorySink::new()).unwrap();
    let report = session.run().unwrap();
    assert_eq!(report.tiles_written, 1);
    assert!(report.levels.is_empty());
    assert_eq!(session.view().zoom(), 0);
}

#[test]
fn initial_zoom_is_applied_before_the_first_level() {
    let viewer = profile((40, 30), (10, 10), (0, 0));
    let mut cfg = config(viewer.clone(), 1);
    cfg.initial_zoom = 1;
    let mut session = GrabSession::new(cfg, direct_viewer(&viewer), MemorySink::new()).unwrap();
    let report = session.run().unwrap();
    assert_eq!(session.view().zoom(), 2);
    // Tiles are a quarter of the reference width, so more of them are needed.
    assert!(report.levels[0].slices_x >= 5);
}

#[test]
fn spawned_session_can_be_cancelled_from_a_status_callback() {
    let viewer = profile((40, 30), (10, 10), (0, 0));
    let session =
        GrabSession::new(config(viewer.clone(), 2), direct_viewer(&viewer), MemorySink::new()).unwrap();
    let token = session.cancel_token();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let session = session.on_status(move |text| {
        log.lock().unwrap().push(text.to_string());
        if text.starts_with("Zooming in") {
            token.cancel();
        }
    });

    let handle = session.spawn().unwrap();
    let (session, result) = handle.join_session().unwrap();
    let report = result.unwrap();
    assert_eq!(report.status, SessionStatus::Cancelled);
    assert_eq!(report.tiles_written, 1);
    assert_eq!(session.sink().tiles.len(), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], "Grabbing: z=0/2 => x=0/0, y=0/0 (0%)...");
    assert_eq!(seen.last().map(String::as_str), Some("Cancelled."));
}
