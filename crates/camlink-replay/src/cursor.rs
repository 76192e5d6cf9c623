/// Sequential playback position over a recording of `frame_count` frames.
///
/// Indices are 0-based and monotone within a lap. At the bound the cursor
/// either wraps to 0 (loop mode) or finishes; a finished cursor yields
/// nothing until `reset`.
#[derive(Debug, Clone)]
pub struct ReplayCursor {
    next: u32,
    frame_count: u32,
    loop_replay: bool,
    finished: bool,
}

impl ReplayCursor {
    pub fn new(frame_count: u32, loop_replay: bool) -> Self {
        Self {
            next: 0,
            frame_count,
            loop_replay,
            finished: frame_count == 0,
        }
    }

    /// The index to play next, then advance. `None` once playback finished.
    pub fn advance(&mut self) -> Option<u32> {
        if self.finished {
            return None;
        }
        let frame = self.next;
        self.next += 1;
        if self.next >= self.frame_count {
            if self.loop_replay {
                self.next = 0;
            } else {
                self.finished = true;
            }
        }
        Some(frame)
    }

    /// Back to frame 0, un-finishing if needed.
    pub fn reset(&mut self) {
        self.next = 0;
        self.finished = self.frame_count == 0;
    }

    /// True once a non-looping cursor has delivered its last frame.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_looping_cursor_halts_at_bound() {
        let mut cursor = ReplayCursor::new(3, false);
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        assert_eq!(cursor.advance(), Some(2));
        assert!(cursor.is_finished());
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn looping_cursor_wraps_to_zero() {
        let mut cursor = ReplayCursor::new(2, true);
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        assert!(!cursor.is_finished());
    }

    #[test]
    fn zero_frames_is_immediately_finished() {
        let mut cursor = ReplayCursor::new(0, true);
        assert!(cursor.is_finished());
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn reset_restarts_a_finished_cursor() {
        let mut cursor = ReplayCursor::new(1, false);
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), None);
        cursor.reset();
        assert_eq!(cursor.advance(), Some(0));
    }
}
