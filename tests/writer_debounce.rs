use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use zen::config::StorageConfig;
use zen::model::{Effort, Priority};
use zen::session::Session;
use zen::storage::{Gateway, KeyValueFile, KeyValueMedium, Medium, Source, Storage};
use zen::writer::Writer;
use zen::{Error, Result};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

struct Broken;

impl Medium for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn read(&self) -> Result<Option<String>> {
        Err(Error::StorageUnavailable("read-only".to_string()))
    }

    fn write(&self, _data: &str) -> Result<()> {
        Err(Error::StorageUnavailable("read-only".to_string()))
    }
}

/// Records every payload and holds the first write until `open` is called.
#[derive(Clone, Default)]
struct Gated {
    written: Arc<Mutex<Vec<String>>>,
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl Gated {
    fn open(&self) {
        let (lock, cvar) = &*self.gate;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

impl Medium for Gated {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn read(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn write(&self, data: &str) -> Result<()> {
        self.written.lock().unwrap().push(data.to_string());
        let (lock, cvar) = &*self.gate;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
        Ok(())
    }
}

/// Mutate the session a few times, handing each snapshot to the writer.
fn burst(session: &mut Session, writer: &Writer) {
    let acme = session.add_client("Acme", Priority::High, now()).unwrap().id;
    writer.save(session.projects().to_vec());
    for title in ["one", "two", "three"] {
        session
            .add_task(acme, title, Priority::Normal, Effort::Quick, now())
            .unwrap();
        writer.save(session.projects().to_vec());
    }
    session.mark_clean();
}

#[tokio::test]
async fn burst_of_changes_lands_as_one_write() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(dir.path(), StorageConfig::default());
    let writer = Writer::spawn(Arc::new(storage.gateway()), Duration::from_millis(200));

    let mut session = Session::default();
    burst(&mut session, &writer);
    writer.flush().await;
    let stats = writer.shutdown().await;

    assert_eq!(stats.writes, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.last_source, Some(Source::Primary));

    let report = storage.gateway().load(now());
    assert_eq!(report.projects, session.projects());
    assert_eq!(report.projects[0].tasks[0].title, "three");
}

#[tokio::test]
async fn refused_primary_writes_go_to_the_backup_key() {
    let dir = TempDir::new().unwrap();
    let kv = KeyValueFile::new(dir.path().join("local-storage.json"));
    let gateway = Gateway::new(
        Box::new(Broken),
        Box::new(KeyValueMedium::new(kv.clone(), "zen_backup_web")),
    );
    let writer = Writer::spawn(Arc::new(gateway), Duration::from_millis(50));

    let mut session = Session::default();
    burst(&mut session, &writer);
    let stats = writer.shutdown().await;

    assert_eq!(stats.last_source, Some(Source::Secondary));
    let backup = kv.get("zen_backup_web").unwrap().unwrap();
    assert!(backup.contains("\"three\""));
}

#[tokio::test]
async fn failed_saves_are_counted_and_do_not_stop_the_writer() {
    let gateway = Gateway::new(Box::new(Broken), Box::new(Broken));
    let writer = Writer::spawn(Arc::new(gateway), Duration::from_millis(50));

    let mut session = Session::default();
    burst(&mut session, &writer);
    writer.flush().await;

    session.add_client("Globex", Priority::Low, now()).unwrap();
    writer.save(session.projects().to_vec());
    let stats = writer.shutdown().await;

    assert_eq!(stats.writes, 0);
    assert_eq!(stats.failures, 2);
}

#[tokio::test(start_paused = true)]
async fn nothing_is_written_inside_the_debounce_window() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(dir.path(), StorageConfig::default());
    let writer = Writer::spawn(Arc::new(storage.gateway()), Duration::from_millis(500));

    let mut session = Session::default();
    let acme = session.add_client("Acme", Priority::High, now()).unwrap().id;
    writer.save(session.projects().to_vec());
    for title in ["first", "second"] {
        tokio::time::sleep(Duration::from_millis(300)).await;
        session
            .add_task(acme, title, Priority::Normal, Effort::Medium, now())
            .unwrap();
        writer.save(session.projects().to_vec());
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!storage.db_file().exists());

    let stats = writer.shutdown().await;
    assert_eq!(stats.writes, 1);
    let report = storage.gateway().load(now());
    assert_eq!(report.projects[0].tasks.len(), 2);
}

#[tokio::test]
async fn snapshots_during_a_slow_write_collapse_to_the_latest() {
    let primary = Gated::default();
    let gateway = Gateway::new(Box::new(primary.clone()), Box::new(Broken));
    let writer = Writer::spawn(Arc::new(gateway), Duration::from_millis(20));

    let mut session = Session::default();
    let snapshot = |session: &mut Session, name: &str| {
        session.add_client(name, Priority::Normal, now()).unwrap();
        session.projects().to_vec()
    };

    writer.save(snapshot(&mut session, "first"));
    tokio::time::timeout(Duration::from_secs(5), async {
        while primary.written().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first write started");

    // Each snapshot outlives the debounce while the first write is stuck.
    writer.save(snapshot(&mut session, "second"));
    tokio::time::sleep(Duration::from_millis(80)).await;
    writer.save(snapshot(&mut session, "third"));
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(primary.written().len(), 1);

    primary.open();
    writer.flush().await;
    let stats = writer.shutdown().await;

    let written = primary.written();
    assert_eq!(written.len(), 2);
    assert!(written[0].contains("\"first\""));
    assert!(!written[0].contains("\"second\""));
    assert!(written[1].contains("\"third\""));
    assert_eq!(stats.writes, 2);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.last_source, Some(Source::Primary));
}
