//! Raw text decoder with in-band preamble marker.

use tracing::debug;

use super::DecodedFrame;

/// Decoder for a continuous text body
///
/// Everything up to and including the first marker occurrence is the
/// preamble: it is reported on the process channel and never becomes answer
/// text. Once the marker is seen the decoder passes text straight through and
/// never scans again, so later occurrences are ordinary text.
#[derive(Debug)]
pub struct RawDecoder {
    marker: String,
    preamble: String,
    /// Bytes of `preamble` already searched
    scanned: usize,
    /// Length of the process text last reported
    reported: usize,
    closed: bool,
}

impl RawDecoder {
    /// Create a decoder looking for `marker`
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            preamble: String::new(),
            scanned: 0,
            reported: 0,
            closed: false,
        }
    }

    /// Whether the marker has been seen (never reverts)
    #[must_use]
    pub fn preamble_closed(&self) -> bool {
        self.closed
    }

    /// Feed one physical read
    pub fn push(&mut self, chunk: &str) -> Vec<DecodedFrame> {
        if self.closed {
            return if chunk.is_empty() {
                Vec::new()
            } else {
                vec![DecodedFrame::Text(chunk.to_string())]
            };
        }

        self.preamble.push_str(chunk);
        if self.marker.is_empty() {
            return Vec::new();
        }

        // Back up far enough to catch a marker split across reads
        let mut start = self.scanned.saturating_sub(self.marker.len() - 1);
        while !self.preamble.is_char_boundary(start) {
            start -= 1;
        }
        self.scanned = self.preamble.len();

        if let Some(rel) = self.preamble[start..].find(&self.marker) {
            let marker_at = start + rel;
            let answer = self.preamble.split_off(marker_at + self.marker.len());
            self.preamble.truncate(marker_at);
            self.closed = true;
            debug!(
                preamble_len = self.preamble.len(),
                "Preamble marker detected"
            );

            // Not needed once closed
            let preamble = std::mem::take(&mut self.preamble);
            let mut frames = vec![DecodedFrame::PreambleClosed(preamble)];
            if !answer.is_empty() {
                frames.push(DecodedFrame::Text(answer));
            }
            return frames;
        }

        // Hold back a tail that could still turn into the marker
        let visible = self.preamble.len() - self.partial_marker_suffix();
        if visible > self.reported {
            let grown = self.preamble[self.reported..visible].to_string();
            self.reported = visible;
            vec![DecodedFrame::Process(grown)]
        } else {
            Vec::new()
        }
    }

    /// End of body; without a marker the whole body is the answer
    pub fn finish(&mut self) -> Vec<DecodedFrame> {
        if self.closed || self.preamble.is_empty() {
            return Vec::new();
        }
        debug!(
            body_len = self.preamble.len(),
            "Body ended without preamble marker, treating it as the answer"
        );
        let body = std::mem::take(&mut self.preamble);
        self.scanned = 0;
        self.reported = 0;
        vec![DecodedFrame::ProcessDiscarded, DecodedFrame::Text(body)]
    }

    /// Length of the longest preamble suffix that is a proper marker prefix
    fn partial_marker_suffix(&self) -> usize {
        self.marker
            .char_indices()
            .skip(1)
            .map(|(idx, _)| idx)
            .filter(|&len| self.preamble.ends_with(&self.marker[..len]))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MARKER: &str = "PREQUESTIONEND";

    fn answer(frames: &[DecodedFrame]) -> String {
        frames
            .iter()
            .filter_map(|f| match f {
                DecodedFrame::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn closes(frames: &[DecodedFrame]) -> usize {
        frames
            .iter()
            .filter(|f| matches!(f, DecodedFrame::PreambleClosed(_)))
            .count()
    }

    fn feed(chunks: &[&str]) -> Vec<DecodedFrame> {
        let mut decoder = RawDecoder::new(MARKER);
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(decoder.push(chunk));
        }
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_marker_in_one_read() {
        let frames = feed(&["I will think...PREQUESTIONEND42"]);
        assert_eq!(answer(&frames), "42");
        assert_eq!(closes(&frames), 1);
        assert!(frames.contains(&DecodedFrame::PreambleClosed("I will think...".to_string())));
    }

    #[test]
    fn test_marker_split_across_reads() {
        let frames = feed(&["I will think...PREQUESTIONE", "ND42"]);
        assert_eq!(answer(&frames), "42");
        assert_eq!(closes(&frames), 1);
    }

    #[test]
    fn test_every_split_point_matches_whole_body() {
        let body = "reasoning about it PREQUESTIONEND the answer is 42";
        let whole = feed(&[body]);
        for i in 0..=body.len() {
            let frames = feed(&[&body[..i], &body[i..]]);
            assert_eq!(answer(&frames), answer(&whole), "split at {i}");
            assert_eq!(closes(&frames), 1, "split at {i}");
        }
    }

    #[test]
    fn test_marker_split_over_many_reads() {
        let frames = feed(&["abc PRE", "QUES", "TION", "E", "ND", " tail"]);
        assert_eq!(answer(&frames), " tail");
        assert_eq!(closes(&frames), 1);
    }

    #[test]
    fn test_process_text_excludes_partial_marker() {
        let mut decoder = RawDecoder::new(MARKER);
        let frames = decoder.push("thinking PREQ");
        assert_eq!(frames, vec![DecodedFrame::Process("thinking ".to_string())]);
        // Tail turned out not to be the marker
        let frames = decoder.push("uick");
        assert_eq!(frames, vec![DecodedFrame::Process("PREQuick".to_string())]);
        assert!(!decoder.preamble_closed());
    }

    #[test]
    fn test_process_frames_carry_only_new_text() {
        let mut decoder = RawDecoder::new(MARKER);
        let mut shown = String::new();
        for chunk in ["step one, ", "step two", ", done PREQUES"] {
            for frame in decoder.push(chunk) {
                if let DecodedFrame::Process(grown) = frame {
                    shown.push_str(&grown);
                }
            }
        }
        assert_eq!(shown, "step one, step two, done ");

        let frames = decoder.push("TIONEND!");
        assert_eq!(
            frames,
            vec![
                DecodedFrame::PreambleClosed("step one, step two, done ".to_string()),
                DecodedFrame::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_second_marker_is_plain_text() {
        let frames = feed(&["aPREQUESTIONENDbPREQUESTIONENDc"]);
        assert_eq!(answer(&frames), "bPREQUESTIONENDc");
        assert_eq!(closes(&frames), 1);
    }

    #[test]
    fn test_no_marker_whole_body_is_answer() {
        let frames = feed(&["just ", "an answer"]);
        assert_eq!(answer(&frames), "just an answer");
        assert_eq!(closes(&frames), 0);
        assert_eq!(frames[frames.len() - 2], DecodedFrame::ProcessDiscarded);
    }

    #[test]
    fn test_text_after_close_passes_through() {
        let mut decoder = RawDecoder::new(MARKER);
        decoder.push("xPREQUESTIONEND");
        assert!(decoder.preamble_closed());
        assert_eq!(
            decoder.push("more"),
            vec![DecodedFrame::Text("more".to_string())]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_multibyte_preamble() {
        let frames = feed(&["pensée…PREQUESTION", "END réponse"]);
        assert_eq!(answer(&frames), " réponse");
    }
}
