use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use lopdf::{dictionary, Document, Object};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HEADER: &str = "Page,Origin,Raw_X,Raw_Y,X,Y,PART,NAME,MM_X,MM_Y,Data_Type,Align";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// A two-page document (200x300 pt and 400x600 pt) and an empty history slot.
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        fs::write(dir.path().join("form.pdf"), pdf_with_pages(&[(200, 300), (400, 600)]))
            .expect("pdf fixture should be written");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn pdf(&self) -> PathBuf {
        self.path("form.pdf")
    }

    fn history(&self) -> PathBuf {
        self.path("history.csv")
    }

    fn history_text(&self) -> String {
        fs::read_to_string(self.history()).expect("history should be readable")
    }

    /// Command isolated from the user's config file and environment.
    fn cmd(&self) -> Command {
        self.cmd_with_config(&self.path("no-config.toml"))
    }

    fn cmd_with_config(&self, config: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("pagepoint");
        cmd.arg("--config").arg(config);
        for var in [
            "PAGEPOINT_DEFAULT_ORIGIN",
            "PAGEPOINT_ZOOM_STEP",
            "PAGEPOINT_MIN_ZOOM",
            "PAGEPOINT_MAX_ZOOM",
            "PAGEPOINT_MARKER_TOLERANCE_PX",
            "PAGEPOINT_PER_PAGE_DIMENSIONS",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn record(&self, page: u32, x: f64, y: f64, extra: &[&str]) -> String {
        let output = self
            .cmd()
            .arg("record")
            .arg(self.pdf())
            .arg("--history")
            .arg(self.history())
            .args(["--page", &page.to_string(), "--x", &x.to_string(), "--y", &y.to_string()])
            .args(extra)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(output).expect("stdout should be utf-8")
    }

    fn run(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).assert().success().get_output().stdout.clone();
        String::from_utf8(output).expect("stdout should be utf-8")
    }

    /// Two points: #1 on page 1, #2 on page 2 recorded at zoom 2.
    fn with_two_points(self) -> Self {
        self.record(1, 100.0, 50.0, &[]);
        self.record(2, 20.0, 40.0, &["--zoom", "2", "--name", "total"]);
        self
    }
}

fn pdf_with_pages(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = sizes
        .iter()
        .map(|&(width, height)| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ],
            });
            Object::Reference(page_id)
        })
        .collect();

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(sizes.len() as i64),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn info_emits_stable_json_contract() {
    let ws = Workspace::new();
    let output = ws.run(&["info", &path_arg(&ws.pdf())]);

    let mut value: Value = serde_json::from_str(&output).expect("stdout should contain valid json");
    value["path"] = Value::String("<FIXTURE>".to_owned());

    assert_eq!(
        value,
        json!({
            "path": "<FIXTURE>",
            "page_count": 2,
            "pages": [
                { "width": 200.0, "height": 300.0 },
                { "width": 400.0, "height": 600.0 },
            ],
        })
    );
}

#[test]
fn record_writes_history_in_csv_format() {
    let ws = Workspace::new();

    let first = ws.record(1, 100.0, 50.0, &[]);
    let second = ws.record(2, 20.0, 40.0, &["--zoom", "2", "--name", "total"]);

    assert_eq!(first, "# 1 P1 (100.0, 250.0) point_1 Heading\n");
    assert_eq!(second, "# 2 P2 (10.0, 580.0) total Heading\n");
    assert_eq!(
        ws.history_text(),
        format!(
            "{HEADER}\n\
             1,Bottom-Left,100.00,50.00,100.00,250.00,Heading,point_1,35.28,88.19,Text,Left\n\
             2,Bottom-Left,10.00,20.00,10.00,580.00,Heading,total,3.53,204.61,Text,Left\n"
        )
    );
}

#[test]
fn record_on_existing_marker_is_a_hit() {
    let ws = Workspace::new().with_two_points();

    let output = ws.record(1, 110.0, 60.0, &[]);

    assert_eq!(output, "hit #1 (no point recorded)\n");
    assert_eq!(ws.history_text().lines().count(), 3);
}

#[test]
fn record_refuses_zoom_outside_limits() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("record")
        .arg(ws.pdf())
        .arg("--history")
        .arg(ws.history())
        .args(["--x", "800", "--y", "400", "--zoom", "8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("zoom 8 is outside the range"));

    assert!(!ws.history().exists());

    // At the upper limit the typed canvas position maps back exactly
    let output = ws.record(1, 500.0, 250.0, &["--zoom", "5", "--origin", "Top-Left"]);
    assert_eq!(output, "# 1 P1 (100.0, 50.0) point_1 Heading\n");
}

#[test]
fn record_refuses_non_finite_coordinates() {
    let ws = Workspace::new().with_two_points();
    let before = ws.history_text();

    for (x, y) in [("NaN", "10"), ("10", "inf")] {
        ws.cmd()
            .arg("record")
            .arg(ws.pdf())
            .arg("--history")
            .arg(ws.history())
            .args(["--x", x, "--y", y])
            .assert()
            .failure()
            .stderr(predicate::str::contains("is not a finite number"));
    }

    assert_eq!(ws.history_text(), before);
    ws.run(&["list", "--history", &path_arg(&ws.history())]);
}

#[test]
fn list_prints_summary_lines() {
    let ws = Workspace::new().with_two_points();
    let history = path_arg(&ws.history());

    let all = ws.run(&["list", "--history", &history]);
    insta::assert_snapshot!(all.trim_end(), @r"
    # 1 P1 (100.0, 250.0) point_1 Heading
    # 2 P2 (10.0, 580.0) total Heading
    ");

    let page_two = ws.run(&["list", "--history", &history, "--page", "2"]);
    assert_eq!(page_two, "# 2 P2 (10.0, 580.0) total Heading\n");
}

#[test]
fn list_json_keeps_history_index() {
    let ws = Workspace::new().with_two_points();
    let output = ws.run(&["list", "--history", &path_arg(&ws.history()), "--page", "2", "--json"]);

    let value: Value = serde_json::from_str(&output).expect("stdout should contain valid json");
    let entries = value.as_array().expect("listing should be an array");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["index"], json!(2));
    assert_eq!(entries[0]["name"], json!("total"));
    assert_eq!(entries[0]["origin"], json!("Bottom-Left"));
    assert_eq!(entries[0]["page_number"], json!(2));
}

#[test]
fn origin_recomputes_with_each_page_size() {
    let ws = Workspace::new().with_two_points();
    let pdf = path_arg(&ws.pdf());
    let history = path_arg(&ws.history());

    let output = ws.run(&["origin", &pdf, "--history", &history, "--origin", "Top-Right"]);
    insta::assert_snapshot!(output.trim_end(), @r"
    # 1 P1 (100.0, 50.0) point_1 Heading
    # 2 P2 (390.0, 20.0) total Heading
    ");

    let output = ws.run(&[
        "origin",
        &pdf,
        "--history",
        &history,
        "--origin",
        "Top-Right",
        "--current-page-dims",
        "--page",
        "1",
    ]);
    assert!(output.ends_with("# 2 P2 (190.0, 20.0) total Heading\n"));
}

#[test]
fn origin_rejects_unknown_token() {
    let ws = Workspace::new().with_two_points();

    ws.cmd()
        .arg("origin")
        .arg(ws.pdf())
        .arg("--history")
        .arg(ws.history())
        .args(["--origin", "Center"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid argument"));
}

#[test]
fn move_drags_point_on_its_page() {
    let ws = Workspace::new().with_two_points();

    let output = ws.run(&[
        "move",
        &path_arg(&ws.pdf()),
        "--history",
        &path_arg(&ws.history()),
        "--index",
        "1",
        "--x",
        "40",
        "--y",
        "40",
    ]);

    assert!(output.contains("Raw coordinates (Top-Left):\nX: 40.00\nY: 40.00"));
    assert!(output.contains("Adjusted coordinates:\nX: 40.00\nY: 260.00"));
    assert!(ws.history_text().contains("\n1,Bottom-Left,40.00,40.00,40.00,260.00,"));
}

#[test]
fn edit_applies_labels_and_adjusted_values() {
    let ws = Workspace::new().with_two_points();

    ws.run(&[
        "edit",
        &path_arg(&ws.pdf()),
        "--history",
        &path_arg(&ws.history()),
        "--index",
        "1",
        "--name",
        "invoice",
        "--part",
        "Body",
        "--datatype",
        "Numeric 2 digits",
        "--x",
        "1",
        "--y",
        "2",
    ]);

    assert!(ws
        .history_text()
        .contains("\n1,Bottom-Left,100.00,50.00,1.00,2.00,Body,invoice,0.35,0.71,Numeric 2 digits,Left\n"));
}

#[test]
fn edit_raw_change_rederives_adjusted() {
    let ws = Workspace::new().with_two_points();

    ws.run(&[
        "edit",
        &path_arg(&ws.pdf()),
        "--history",
        &path_arg(&ws.history()),
        "--index",
        "2",
        "--raw-x",
        "50",
        "--raw-y",
        "100",
    ]);

    assert!(ws.history_text().contains("\n2,Bottom-Left,50.00,100.00,50.00,500.00,"));
}

#[test]
fn delete_and_clear() {
    let ws = Workspace::new().with_two_points();
    let history = path_arg(&ws.history());

    let output = ws.run(&["delete", "--history", &history, "--index", "2"]);
    assert_eq!(output, "deleted #2 (page 2, (10.00, 580.00))\n");

    ws.cmd()
        .args(["delete", "--history", &history, "--index", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("point #5 does not exist"));

    let output = ws.run(&["clear", "--history", &history]);
    assert_eq!(output, "cleared 1 point(s)\n");
    assert_eq!(ws.history_text(), format!("{HEADER}\n"));

    let output = ws.run(&["list", "--history", &history]);
    assert_eq!(output, "");
}

#[test]
fn import_skips_malformed_rows() {
    let ws = Workspace::new().with_two_points();
    let source = ws.path("incoming.csv");
    fs::write(
        &source,
        format!(
            "{HEADER}\n\
             3,Top-Left,1.00,2.00,1.00,2.00,Summary,total,0.35,0.71,Date,Right\n\
             3,Top-Left,1.00,2.00,1.00,2.00,Summary,total,0.35,0.71,Date\n\
             3,Middle,1.00,2.00,1.00,2.00,Summary,total,0.35,0.71,Date,Right\n"
        ),
    )
    .unwrap();

    ws.cmd()
        .arg("import")
        .arg(&source)
        .arg("--history")
        .arg(ws.history())
        .args(["--mode", "append"])
        .assert()
        .success()
        .stdout("imported 1 point(s), skipped 2 row(s), history has 3 point(s)\n")
        .stderr(predicate::str::contains(
            "warning: line 3: invalid format, expected 12 columns, got 11",
        ))
        .stderr(predicate::str::contains("warning: line 4: invalid origin 'Middle'"));

    assert!(ws
        .history_text()
        .ends_with("\n3,Top-Left,1.00,2.00,1.00,2.00,Summary,total,0.35,0.71,Date,Right\n"));

    ws.run(&["import", &path_arg(&source), "--history", &path_arg(&ws.history()), "--mode", "replace"]);
    assert_eq!(ws.history_text().lines().count(), 2);
}

#[test]
fn import_abort_leaves_history_untouched() {
    let ws = Workspace::new().with_two_points();
    let before = ws.history_text();
    let source = ws.path("incoming.csv");
    fs::write(&source, "1,Top-Left,1,2,1,2,Heading,a,0.35,0.71,Text,Left\n").unwrap();

    let output = ws.run(&[
        "import",
        &path_arg(&source),
        "--history",
        &path_arg(&ws.history()),
        "--mode",
        "abort",
    ]);

    assert_eq!(output, "import aborted: 1 valid point(s), 0 skipped row(s)\n");
    assert_eq!(ws.history_text(), before);
}

#[test]
fn import_without_valid_rows_fails() {
    let ws = Workspace::new().with_two_points();
    let before = ws.history_text();
    let source = ws.path("broken.csv");
    fs::write(&source, "1,Top-Left,1,2,1,2,Heading,a,0.35,0.71,Text\n").unwrap();

    ws.cmd()
        .arg("import")
        .arg(&source)
        .arg("--history")
        .arg(ws.history())
        .args(["--mode", "replace"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("warning: line 1: invalid format"))
        .stderr(predicate::str::contains("error: no valid click data found"));

    assert_eq!(ws.history_text(), before);
}

#[test]
fn render_writes_png_with_markers() {
    let ws = Workspace::new().with_two_points();
    let output_path = ws.path("out").join("page1.png");

    ws.cmd()
        .arg("render")
        .arg(ws.pdf())
        .args(["--page", "1", "--zoom", "1.5", "--history"])
        .arg(ws.history())
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success();

    let image = image::open(&output_path).expect("render should be readable image").to_rgba8();
    assert_eq!((image.width(), image.height()), (300, 450));
    // point #1 sits at raw (100, 50)
    assert_eq!(image.get_pixel(150, 75).0, [220, 30, 30, 255]);
    assert_eq!(image.get_pixel(20, 400).0, [255, 255, 255, 255]);
}

#[test]
fn render_rejects_page_zero() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("render")
        .arg(ws.pdf())
        .args(["--page", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--page is 1-based"));
}

#[test]
fn info_fails_for_missing_file() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("info")
        .arg(ws.path("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn info_fails_for_invalid_pdf() {
    let ws = Workspace::new();
    let invalid = ws.path("invalid.pdf");
    fs::write(&invalid, b"not a pdf").unwrap();

    ws.cmd()
        .arg("info")
        .arg(&invalid)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open PDF"));
}

#[test]
fn config_file_sets_default_origin() {
    let ws = Workspace::new();
    let config = ws.path("pagepoint.toml");
    fs::write(&config, "default_origin = \"Top-Left\"\n").unwrap();

    let output = ws
        .cmd_with_config(&config)
        .arg("record")
        .arg(ws.pdf())
        .arg("--history")
        .arg(ws.history())
        .args(["--x", "30", "--y", "40"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(String::from_utf8_lossy(&output), "# 1 P1 (30.0, 40.0) point_1 Heading\n");
}

#[test]
fn version_prints_package_version() {
    let ws = Workspace::new();

    ws.cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(env!("CARGO_PKG_VERSION")));
}
