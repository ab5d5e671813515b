use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Terminal progress rendering for chunk sequences.
pub struct ProgressManager {
    mp: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            mp: MultiProgress::new(),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn create_bar(
        &self,
        id: &str,
        total: u64,
        template: &str,
        message: &str,
    ) -> Result<(), String> {
        let mut bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;

        if bars.contains_key(id) {
            return Err(format!("Progress bar '{}' already exists", id));
        }

        let pb = self
            .mp
            .add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        pb.set_message(message.to_string());

        bars.insert(id.to_string(), pb);
        Ok(())
    }

    pub fn inc(&self, id: &str, value: u64) -> Result<(), String> {
        let bars = self
            .bars
            .lock()
            .map_err(|e| format!("Lock error: {}", e))?;
        if let Some(pb) = bars.get(id) {
            pb.inc(value);
            Ok(())
        } else {
            Err(format!("Progress bar '{}' not found", id))
        }
    }

    pub fn finish_all(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, pb) in bars.drain() {
                pb.finish();
            }
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

pub mod templates {
    pub const CHUNKS: &str =
        "\u{f048a} SEND [{bar:30.cyan}] {percent}% ({pos}/{len} chunks) {msg}";
}
