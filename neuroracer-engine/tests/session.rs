use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use neuroracer_core::{CueModality, RunState};
use neuroracer_engine::{
    Backends, Command, CsvJournal, CueSink, DeviceBackend, EngineConfig, MemoryJournal,
    Notification, RunSummary, Session, SimulatedBackend,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep, timeout};

#[derive(Default)]
struct RecordingCues(Mutex<Vec<CueModality>>);

impl CueSink for RecordingCues {
    fn dispatch(&self, modality: CueModality) -> Option<String> {
        self.0.lock().unwrap().push(modality);
        Some(modality.to_string().to_ascii_lowercase())
    }
}

struct Rig {
    session: Session,
    rx: UnboundedReceiver<Notification>,
    sim: SimulatedBackend,
    pad: String,
    journal: MemoryJournal,
    cues: Arc<RecordingCues>,
}

fn config() -> EngineConfig {
    EngineConfig {
        schedule_path: PathBuf::from("/nonexistent/neuroracer/schedule.json"),
        output_dir: Some(std::env::temp_dir()),
        ..EngineConfig::default()
    }
}

fn rig() -> Rig {
    let sim = SimulatedBackend::new();
    let pad = sim.attach("Pad", 8).id;
    let journal = MemoryJournal::default();
    let cues = Arc::new(RecordingCues::default());
    let backends = Backends {
        devices: Arc::new(sim.clone()),
        cues: cues.clone(),
        journal: Arc::new(journal.clone()),
        settings: None,
    };
    let (session, rx) = Session::start(config(), backends);
    Rig {
        session,
        rx,
        sim,
        pad,
        journal,
        cues,
    }
}

fn schedule_file(tag: &str, entries: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("neuroracer-it-{}-{}.json", tag, std::process::id()));
    std::fs::write(&path, format!("{{\"test_schedule\": [{}]}}", entries)).unwrap();
    path
}

const AUDIO: &str = r#"{"audio_cue": true, "visual_cue": false}"#;
const VISUAL: &str = r#"{"audio_cue": false, "visual_cue": true}"#;

fn wait(min: u32, max: u32) -> String {
    format!(r#"{{"wait": {{"between": [{{"min": {}, "max": {}}}]}}}}"#, min, max)
}

impl Rig {
    fn load(&self, tag: &str, entries: &[&str]) {
        let path = schedule_file(tag, &entries.join(","));
        assert!(self.session.send(Command::LoadSchedule(path)));
    }

    async fn until_log(&mut self, needle: &str) {
        timeout(Duration::from_secs(120), async {
            loop {
                match self.rx.recv().await {
                    Some(Notification::Log(line)) if line.contains(needle) => return,
                    Some(_) => {}
                    None => panic!("session closed before '{}'", needle),
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no log line containing '{}'", needle));
    }

    /// Drains notifications until the run finishes; returns the summary and
    /// the last progress step seen.
    async fn until_finished(&mut self) -> (RunSummary, Option<(f64, usize)>) {
        timeout(Duration::from_secs(120), async {
            let mut progress = None;
            loop {
                match self.rx.recv().await {
                    Some(Notification::Progress { fraction, step, .. }) => {
                        progress = Some((fraction, step))
                    }
                    Some(Notification::RunFinished(summary)) => return (summary, progress),
                    Some(_) => {}
                    None => panic!("session closed before the run finished"),
                }
            }
        })
        .await
        .expect("run did not finish")
    }
}

#[tokio::test(start_paused = true)]
async fn press_300ms_after_audio_cue_is_logged_with_its_reaction_time() {
    let mut rig = rig();
    rig.load("press", &[wait(1, 2).as_str(), AUDIO]);
    rig.session.send(Command::Start);

    rig.until_log("Audio cue").await;
    sleep(Duration::from_millis(300)).await;
    rig.sim.press(&rig.pad, 0);
    sleep(Duration::from_millis(150)).await;
    rig.sim.release(&rig.pad, 0);

    let (summary, _) = rig.until_finished().await;
    assert!(!summary.stopped);
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].modality, CueModality::Audio);
    assert!(records[0].pressed);
    let rt = records[0].reaction_time_ms;
    assert!((300.0..=400.0).contains(&rt), "reaction time {}", rt);
    assert_eq!(*rig.cues.0.lock().unwrap(), vec![CueModality::Audio]);
    assert_eq!(rig.session.run_state(), RunState::Finished);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unanswered_cue_is_logged_as_a_miss() {
    let mut rig = rig();
    rig.load("miss", &[wait(1, 2).as_str(), AUDIO]);
    rig.session.send(Command::Start);

    let started = Instant::now();
    rig.until_log("Audio cue missed").await;
    let (summary, _) = rig.until_finished().await;

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(summary.cues, 1);
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].pressed);
    assert_eq!(records[0].reaction_time_ms, -1.0);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_mid_wait_logs_nothing_and_returns_to_idle() {
    let mut rig = rig();
    rig.load("stop", &[wait(5, 5).as_str(), AUDIO]);
    rig.session.send(Command::Start);

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(rig.session.run_state(), RunState::Running);
    rig.session.send(Command::Stop);

    let (summary, progress) = rig.until_finished().await;
    assert!(summary.stopped);
    assert_eq!(summary.cues, 0);
    assert_eq!(progress, Some((0.0, 0)));
    assert!(rig.journal.sink.records().is_empty());
    assert!(rig.cues.0.lock().unwrap().is_empty());

    sleep(Duration::from_millis(10)).await;
    assert_eq!(rig.session.run_state(), RunState::Idle);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_presses_in_one_window_log_once() {
    let mut rig = rig();
    rig.load("repeat", &[VISUAL]);
    rig.session.send(Command::Start);

    rig.until_log("Visual cue").await;
    for _ in 0..3 {
        sleep(Duration::from_millis(120)).await;
        rig.sim.press(&rig.pad, 0);
        sleep(Duration::from_millis(120)).await;
        rig.sim.release(&rig.pad, 0);
    }

    rig.until_finished().await;
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].pressed);
    assert!(records[0].reaction_time_ms < 300.0);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn presses_outside_a_cue_window_are_not_logged() {
    let mut rig = rig();
    rig.load("idle-press", &[wait(3, 3).as_str(), AUDIO]);
    rig.session.send(Command::Start);

    sleep(Duration::from_millis(500)).await;
    rig.sim.press(&rig.pad, 0);
    sleep(Duration::from_millis(300)).await;
    rig.sim.release(&rig.pad, 0);

    rig.until_log("no active cue").await;
    rig.until_finished().await;
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_miss());
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn every_cue_yields_exactly_one_record() {
    let mut rig = rig();
    let short = wait(0, 1);
    let bad = wait(4, 2);
    rig.load(
        "per-cue",
        &[AUDIO, short.as_str(), VISUAL, bad.as_str(), AUDIO, short.as_str(), VISUAL],
    );
    rig.session.send(Command::Start);

    // Answer the second cue only.
    rig.until_log("Visual cue").await;
    sleep(Duration::from_millis(250)).await;
    rig.sim.press(&rig.pad, 0);

    let (summary, _) = rig.until_finished().await;
    assert_eq!(summary.cues, 4);
    assert_eq!(summary.skipped, 1);
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| r.pressed).count(), 1);
    assert!(records[1].pressed);
    assert_eq!(
        records.iter().map(|r| r.modality).collect::<Vec<_>>(),
        vec![
            CueModality::Audio,
            CueModality::Visual,
            CueModality::Audio,
            CueModality::Visual
        ]
    );
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_continue_from_the_same_point() {
    let mut rig = rig();
    rig.load("pause", &[wait(2, 2).as_str()]);
    rig.session.send(Command::Start);
    let started = Instant::now();

    sleep(Duration::from_millis(1_050)).await;
    rig.session.send(Command::Pause);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(rig.session.run_state(), RunState::Paused);

    rig.session.send(Command::TogglePause);
    let (summary, _) = rig.until_finished().await;
    assert!(!summary.stopped);
    let total = started.elapsed();
    // 2 s of countdown plus the 30 s pause, less the part of the pause that
    // overlapped the tick interval already in flight.
    assert!(total >= Duration::from_millis(31_950) && total <= Duration::from_millis(32_050));
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_during_cue_exposure_defers_the_record() {
    let mut rig = rig();
    rig.load("pause-cue", &[AUDIO]);
    rig.session.send(Command::Start);

    rig.until_log("Audio cue").await;
    let fired = Instant::now();
    rig.until_log("Sent command: audio").await;
    sleep(Duration::from_millis(400)).await;
    rig.session.send(Command::Pause);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(rig.session.run_state(), RunState::Paused);
    assert!(rig.journal.sink.records().is_empty());

    rig.session.send(Command::Resume);
    rig.until_log("Audio cue missed").await;
    let (summary, _) = rig.until_finished().await;
    assert!(!summary.stopped);
    // The 600 ms of exposure left at the pause runs after the resume.
    let total = fired.elapsed();
    assert!(
        total >= Duration::from_millis(5_950) && total <= Duration::from_millis(6_050),
        "exposure took {:?}",
        total
    );
    let records = rig.journal.sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].pressed);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn progress_reports_the_schedule_position() {
    let mut rig = rig();
    rig.load("position", &[wait(1, 1).as_str(), VISUAL]);
    rig.session.send(Command::Start);

    let mut seen = Vec::new();
    timeout(Duration::from_secs(30), async {
        loop {
            match rig.rx.recv().await {
                Some(Notification::Progress { action, actions, .. }) => {
                    if seen.last() != Some(&(action, actions)) {
                        seen.push((action, actions));
                    }
                }
                Some(Notification::RunFinished(_)) => break,
                Some(_) => {}
                None => panic!("session closed before the run finished"),
            }
        }
    })
    .await
    .expect("run did not finish");
    assert_eq!(seen, vec![(0, 2), (1, 2), (2, 2), (0, 2)]);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_ignored() {
    let mut rig = rig();
    rig.load("double", &[wait(1, 1).as_str(), AUDIO]);
    rig.session.send(Command::Start);
    rig.session.send(Command::Start);

    rig.until_log("already in progress").await;
    rig.until_finished().await;
    assert_eq!(rig.journal.sink.records().len(), 1);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn device_changes_are_reported_only_when_the_count_changes() {
    let mut rig = rig();
    sleep(Duration::from_millis(10)).await;
    while rig.rx.try_recv().is_ok() {}

    rig.sim.attach("Wheel", 12);
    sleep(Duration::from_millis(2_100)).await;

    let mut sizes = Vec::new();
    while let Ok(n) = rig.rx.try_recv() {
        if let Notification::DeviceSetChanged(set) = n {
            sizes.push(set.len());
        }
    }
    assert_eq!(sizes, vec![2]);
    assert_eq!(rig.session.selection().device_id(), Some(rig.pad.as_str()));

    let wheel = rig.sim.enumerate()[1].id.clone();
    rig.sim.detach(&wheel);
    rig.sim.attach("Stick", 2);
    sleep(Duration::from_millis(4_000)).await;
    assert!(
        std::iter::from_fn(|| rig.rx.try_recv().ok())
            .all(|n| !matches!(n, Notification::DeviceSetChanged(_)))
    );
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn detection_selects_the_next_pressed_button() {
    let mut rig = rig();
    rig.session.send(Command::BeginButtonDetection);
    sleep(Duration::from_millis(150)).await;
    rig.sim.press(&rig.pad, 5);

    let detected = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(Notification::ButtonDetected(index)) = rig.rx.recv().await {
                return index;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(detected, 5);
    assert_eq!(rig.session.selection().button, 5);
    rig.session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent_and_closes_the_command_queue() {
    let mut rig = rig();
    rig.session.shutdown().await;
    rig.session.shutdown().await;
    assert!(!rig.session.send(Command::Start));
    drop(rig.session);
    while rig.rx.recv().await.is_some() {}
}

#[tokio::test(start_paused = true)]
async fn csv_log_is_written_per_run() {
    let dir = std::env::temp_dir().join(format!("neuroracer-it-csv-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let sim = SimulatedBackend::new();
    sim.attach("Pad", 4);
    let backends = Backends {
        devices: Arc::new(sim),
        cues: Arc::new(RecordingCues::default()),
        journal: Arc::new(CsvJournal),
        settings: None,
    };
    let (mut session, mut rx) = Session::start(config(), backends);
    let path = schedule_file("csv", AUDIO);
    session.send(Command::LoadSchedule(path));
    session.send(Command::SetOutputDirectory(dir.clone()));
    session.send(Command::SetTestName("Subject 7".to_string()));
    session.send(Command::Start);

    timeout(Duration::from_secs(10), async {
        while let Some(n) = rx.recv().await {
            if matches!(n, Notification::RunFinished(_)) {
                break;
            }
        }
    })
    .await
    .unwrap();
    session.shutdown().await;

    let files: Vec<PathBuf> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("Subject 7_") && name.ends_with(".csv"), "{}", name);

    let text = std::fs::read_to_string(&files[0]).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Timestamp,Cue Type,Button Pressed,Reaction Time (ms)");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].ends_with(",Audio,False,-1"), "{}", lines[1]);
    let _ = std::fs::remove_dir_all(&dir);
}
