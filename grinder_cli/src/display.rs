//! Console stand-in for the OLED: prints a frame whenever it changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use grinder_core::StatusBoard;
use serde_json::json;

const POLL: Duration = Duration::from_millis(100);

pub struct FramePrinter {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FramePrinter {
    pub fn spawn(board: Arc<StatusBoard>, json: bool) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("display".into())
            .spawn(move || {
                let mut last: Option<Vec<String>> = None;
                loop {
                    let done = flag.load(Ordering::Relaxed);
                    let lines = grinder_ui::render_board(&board);
                    if last.as_ref() != Some(&lines) {
                        print_frame(&board, &lines, json);
                        last = Some(lines);
                    }
                    if done {
                        break;
                    }
                    thread::sleep(POLL);
                }
            })
            .ok();
        if handle.is_none() {
            tracing::warn!("display thread could not be started; running headless");
        }
        Self { stop, handle }
    }
}

impl Drop for FramePrinter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn print_frame(board: &StatusBoard, lines: &[String], json: bool) {
    let snap = board.snapshot();
    if json {
        println!(
            "{}",
            json!({
                "event": "frame",
                "t_ms": snap.now_ms,
                "state": snap.state.as_str(),
                "weight_g": snap.weight_g,
                "lines": lines,
            })
        );
    } else if lines.is_empty() {
        println!("[{:>7.1}s] (display off)", secs(snap.now_ms));
    } else {
        println!("[{:>7.1}s] {}", secs(snap.now_ms), lines.join(" | "));
    }
}

#[allow(clippy::cast_precision_loss)]
fn secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
