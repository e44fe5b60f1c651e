use crate::frame_id::FrameId;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Per-frame timing log, written only when the receiver runs with an output path. One line per
///  consumed frame; a stage that the laziness level suppressed is recorded as zero. Every line is
///  flushed as it is written: the receiver has no shutdown handshake and ends by being killed, so
///  nothing may sit in a write buffer waiting for drop.
pub struct PerfLog {
    out: BufWriter<File>,
}

impl PerfLog {
    pub fn create(path: &Path) -> anyhow::Result<PerfLog> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "frame_id,frame_bytes,decode_micros,render_micros")?;
        out.flush()?;
        info!("writing performance log to {:?}", path);
        Ok(PerfLog { out })
    }

    pub fn record(&mut self, frame_id: FrameId, frame_bytes: usize, decode_micros: u64, render_micros: u64) -> anyhow::Result<()> {
        writeln!(self.out, "{},{},{},{}", frame_id, frame_bytes, decode_micros, render_micros)?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_record_layout() {
        let path = std::env::temp_dir().join(format!("framelink-perf-{}.csv", Uuid::new_v4()));

        {
            let mut perf_log = PerfLog::create(&path).unwrap();
            perf_log.record(FrameId::ZERO, 14000, 2300, 900).unwrap();
            perf_log.record(FrameId::from_raw(1), 800, 0, 0).unwrap();
        }

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "frame_id,frame_bytes,decode_micros,render_micros\n0,14000,2300,900\n1,800,0,0\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_records_are_on_disk_while_the_log_is_still_open() {
        let path = std::env::temp_dir().join(format!("framelink-perf-{}.csv", Uuid::new_v4()));

        let mut perf_log = PerfLog::create(&path).unwrap();
        perf_log.record(FrameId::from_raw(7), 1400, 250, 90).unwrap();

        // the process ends by being killed, so drop never runs on the real shutdown path
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "frame_id,frame_bytes,decode_micros,render_micros\n7,1400,250,90\n");

        drop(perf_log);
        std::fs::remove_file(&path).unwrap();
    }
}
