// Integration tests driving the Loader end to end over on-disk trees.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xmload::document::Document;
use xmload::loader::{InputMode, Loader, LoaderConfig};
use xmload::sink::{self, DocumentSink, WriteHandle};

/// Sink that records every document and acknowledges immediately.
struct RecordingSink {
    docs: Mutex<Vec<Document>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            docs: Mutex::new(Vec::new()),
        })
    }

    fn collected(&self) -> Vec<Document> {
        self.docs.lock().unwrap().clone()
    }
}

impl DocumentSink for RecordingSink {
    fn write_async(&self, document: Document) -> WriteHandle {
        self.docs.lock().unwrap().push(document);
        WriteHandle::immediate(Ok(1))
    }

    fn concurrency_hint(&self) -> usize {
        2
    }
}

/// Sink that rejects every write.
struct RejectingSink;

impl DocumentSink for RejectingSink {
    fn write_async(&self, _document: Document) -> WriteHandle {
        WriteHandle::immediate(Err("write rejected".to_string()))
    }

    fn concurrency_hint(&self) -> usize {
        1
    }
}

fn config(mode: InputMode, roots: Vec<PathBuf>, threads: usize) -> LoaderConfig {
    let mut config = LoaderConfig::new(mode, roots);
    config.threads = Some(threads);
    config.ack_timeout = Duration::from_secs(5);
    config
}

fn markers(docs: &[Document]) -> Vec<String> {
    let mut markers: Vec<String> = docs
        .iter()
        .map(|doc| {
            doc.get("id")
                .and_then(|v| v.as_scalar())
                .unwrap_or_default()
                .to_string()
        })
        .collect();
    markers.sort();
    markers
}

#[test]
fn test_loads_nested_directory_tree() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    let deeper = sub.join("deeper");
    fs::create_dir_all(&deeper).unwrap();

    fs::write(dir.path().join("a.xml"), r#"<doc id="a"><v>1</v></doc>"#).unwrap();
    fs::write(sub.join("b.xml"), r#"<doc id="b"><v>2</v></doc>"#).unwrap();
    fs::write(deeper.join("c.xml"), r#"<doc id="c"><v>3</v></doc>"#).unwrap();

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        3,
    ));

    let errors = loader.execute(sink.clone());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let docs = sink.collected();
    assert_eq!(docs.len(), 3);
    assert_eq!(markers(&docs), vec!["a", "b", "c"]);
}

#[test]
fn test_converted_document_shape_survives_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("doc.xml"),
        r#"<order id="7"><item>milk</item><item>eggs</item></order>"#,
    )
    .unwrap();

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        1,
    ));

    assert!(loader.execute(sink.clone()).is_empty());

    let docs = sink.collected();
    assert_eq!(docs.len(), 1);
    assert_eq!(
        serde_json::to_string(&docs[0]).unwrap(),
        r#"{"id":"7","item":["milk","eggs"]}"#
    );
}

#[test]
fn test_lines_mode_loads_one_document_per_line() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("events.log"),
        "<e id=\"1\"/>\n<e id=\"2\"/>\n\n<e id=\"3\"/>\n",
    )
    .unwrap();

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Lines,
        vec![dir.path().to_path_buf()],
        2,
    ));

    let errors = loader.execute(sink.clone());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(markers(&sink.collected()), vec!["1", "2", "3"]);
}

#[test]
fn test_missing_root_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ok.xml"), r#"<doc id="ok"/>"#).unwrap();
    let missing = dir.path().join("does-not-exist");

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![missing, dir.path().to_path_buf()],
        2,
    ));

    let errors = loader.execute(sink.clone());
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert_eq!(markers(&sink.collected()), vec!["ok"]);
}

#[test]
fn test_parse_failure_is_recorded_against_its_worker() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.xml"), "<doc><unclosed>").unwrap();

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        2,
    ));

    let errors = loader.execute(sink.clone());
    assert_eq!(errors.len(), 1);
    assert!(format!("{:#}", errors[0]).contains("bad.xml"));
}

#[test]
fn test_sibling_workers_survive_one_workers_failure() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.xml"), "not xml at all").unwrap();
    for i in 0..20 {
        fs::write(
            dir.path().join(format!("ok-{i:02}.xml")),
            format!(r#"<doc id="{i}"/>"#),
        )
        .unwrap();
    }

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        4,
    ));

    let errors = loader.execute(sink.clone());
    assert_eq!(errors.len(), 1);
    // With four workers, only the one that drew the bad file stops; the
    // rest keep loading.
    assert!(!sink.collected().is_empty());
}

#[test]
fn test_write_failures_surface_as_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.xml"), "<doc/>").unwrap();

    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        1,
    ));

    let errors = loader.execute(Arc::new(RejectingSink));
    assert!(!errors.is_empty());
    assert!(format!("{:#}", errors[0]).contains("write rejected"));
}

#[test]
fn test_run_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.xml"), "<doc/>").unwrap();

    let sink = RecordingSink::new();
    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().to_path_buf()],
        1,
    ));

    assert!(loader.run(sink));
}

#[test]
fn test_end_to_end_into_jsonl_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("doc.xml"),
        r#"<person name="ada"><skill>math</skill></person>"#,
    )
    .unwrap();

    let out = dir.path().join("out.jsonl");
    let sink = sink::open_sink(&format!("file://{}", out.display())).unwrap();

    let loader = Loader::new(config(
        InputMode::Files,
        vec![dir.path().join("doc.xml")],
        1,
    ));
    let errors = loader.execute(sink);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let contents = fs::read_to_string(&out).unwrap();
    let value: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
    assert_eq!(value["name"], "ada");
    assert_eq!(value["skill"], "math");
}
