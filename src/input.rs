//! Pose frame stream: newline-delimited JSON, one detection result per line.
//!
//! ```text
//! {"timestamp_ms": 0, "landmarks": [{"x": 0.5, "y": 0.1, "z": 0.0, "visibility": 0.99}, ...]}
//! ```
//!
//! A line whose `landmarks` is `null` or empty means the detector saw nobody;
//! it is skipped silently. Malformed lines surface as [`Error::InvalidFrame`]
//! and the reader carries on with the next line.

use std::io::BufRead;

use log::trace;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::pose::{Landmark, PoseFrame, PoseSample};

#[derive(Deserialize)]
struct RawFrame {
    timestamp_ms: u64,
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

pub struct FrameReader<R> {
    inner: R,
    line: usize,
    buf: String,
    skipped: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
            skipped: 0,
        }
    }

    /// Lines read so far, blank ones included.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// Frames without a detected pose.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse(&self, text: &str) -> Result<Option<PoseFrame>> {
        let line = self.line;
        let raw: RawFrame = serde_json::from_str(text).map_err(|e| Error::InvalidFrame {
            line,
            reason: e.to_string(),
        })?;
        let landmarks = match raw.landmarks {
            Some(v) if !v.is_empty() => v,
            _ => return Ok(None),
        };
        let sample = PoseSample::try_from(landmarks).map_err(|e| match e {
            Error::InvalidFrame { reason, .. } => Error::InvalidFrame { line, reason },
            other => other,
        })?;
        Ok(Some(PoseFrame::new(raw.timestamp_ms, sample)))
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<PoseFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            match self.parse(text) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {
                    trace!("line {}: no pose detected", self.line);
                    self.skipped += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{BodyPart, LANDMARK_COUNT, standing_pose};
    use std::io::Cursor;

    fn line(ts: u64, s: &PoseSample) -> String {
        let landmarks = serde_json::to_string(s).unwrap();
        format!("{{\"timestamp_ms\": {ts}, \"landmarks\": {landmarks}}}\n")
    }

    #[test]
    fn reads_frames_and_skips_empty_detections() {
        let pose = standing_pose();
        let text = [
            line(0, &pose),
            "{\"timestamp_ms\": 33, \"landmarks\": null}\n".to_string(),
            "\n".to_string(),
            "{\"timestamp_ms\": 66, \"landmarks\": []}\n".to_string(),
            "{\"timestamp_ms\": 99}\n".to_string(),
            line(133, &pose),
        ]
        .concat();
        let mut r = FrameReader::new(Cursor::new(text));
        let frames: Vec<_> = r.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_ms, 133);
        assert_eq!(frames[0].sample.get(BodyPart::LeftKnee), pose.get(BodyPart::LeftKnee));
        assert_eq!(r.skipped(), 3);
        assert_eq!(r.lines_read(), 6);
    }

    #[test]
    fn optional_fields_default() {
        let lm = vec!["{\"x\": 0.1, \"y\": 0.2}"; LANDMARK_COUNT].join(",");
        let text = format!("{{\"timestamp_ms\": 5, \"landmarks\": [{lm}]}}");
        let frame = FrameReader::new(Cursor::new(text)).next().unwrap().unwrap();
        let nose = frame.sample.get(BodyPart::Nose);
        assert_eq!(nose.z, 0.0);
        assert_eq!(nose.visibility, 1.0);
    }

    #[test]
    fn bad_lines_report_their_number_and_reading_continues() {
        let pose = standing_pose();
        let short = "{\"timestamp_ms\": 1, \"landmarks\": [{\"x\": 0.1, \"y\": 0.2}]}\n";
        let text = [line(0, &pose), "not json\n".into(), short.into(), line(2, &pose)].concat();
        let items: Vec<_> = FrameReader::new(Cursor::new(text)).collect();
        assert_eq!(items.len(), 4);
        assert!(matches!(items[1], Err(Error::InvalidFrame { line: 2, .. })));
        match &items[2] {
            Err(Error::InvalidFrame { line, reason }) => {
                assert_eq!(*line, 3);
                assert!(reason.contains("expected 33 landmarks, got 1"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(items[3].is_ok());
    }
}
