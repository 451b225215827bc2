use std::{
    io::Stdout,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use pbr::{ProgressBar, Units};
use uf2_decode_core::monitor::DecodeMonitor;

/// Shows block progress on stdout and stops the decode once `cancel` is set.
pub struct ProgressBarReporter {
    pb: Option<ProgressBar<Stdout>>,
    show: bool,
    cancel: Arc<AtomicBool>,
}

impl ProgressBarReporter {
    pub fn new(show: bool, cancel: Arc<AtomicBool>) -> Self {
        Self {
            pb: None,
            show,
            cancel,
        }
    }
}

impl DecodeMonitor for ProgressBarReporter {
    fn start(&mut self, total_blocks: u64) {
        if self.show {
            log::info!("Decoding {} blocks", total_blocks);
            let mut pb = ProgressBar::new(total_blocks);
            pb.set_units(Units::Default);
            self.pb = Some(pb);
        }
    }

    fn advance(&mut self, blocks: u64) {
        if let Some(pb) = self.pb.as_mut() {
            pb.add(blocks);
        }
    }

    fn finish(&mut self) {
        if let Some(pb) = self.pb.as_mut() {
            pb.finish();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
