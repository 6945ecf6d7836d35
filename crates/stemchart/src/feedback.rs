//! Visual feedback
//!
//! Observers receive every published snapshot. Drawing is theirs; the
//! session only promises that each snapshot is complete and consistent.

use std::io::Write;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::session::{SessionSnapshot, TransportState};

/// Consumer of session updates
pub trait VisualFeedback: Send {
    fn render(&mut self, snapshot: &SessionSnapshot);

    /// Called once after the session stops publishing
    fn finish(&mut self) {}
}

/// Drive `feedback` from `updates` until the session goes away.
///
/// Renders the current state immediately, then every change. Returns the
/// feedback so callers can inspect it afterwards.
pub fn spawn_feedback<F>(mut updates: watch::Receiver<SessionSnapshot>, mut feedback: F) -> JoinHandle<F>
where
    F: VisualFeedback + 'static,
{
    tokio::spawn(async move {
        let initial = updates.borrow_and_update().clone();
        feedback.render(&initial);

        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            feedback.render(&snapshot);
        }

        feedback.finish();
        feedback
    })
}

/// Width of the text progress bar, in cells
pub const BAR_WIDTH: usize = 30;

/// `[#####.........]` for a fraction in `0.0..=1.0`
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

/// One status line: cursor, transport, and per-channel reveal counts
pub fn render_line(snapshot: &SessionSnapshot) -> String {
    let state = match snapshot.state {
        TransportState::Idle => "idle",
        TransportState::Playing => "playing",
    };

    let channels: Vec<String> = snapshot
        .channels
        .iter()
        .map(|c| {
            let mark = if !c.available() {
                "n/a"
            } else if c.enabled {
                "on"
            } else {
                "off"
            };
            format!("{} {} {}/{}", c.kind, mark, c.revealed_count(), c.points.len())
        })
        .collect();

    format!(
        "{} {:>5.2}/{:.2} {:<7} | {}",
        progress_bar(snapshot.progress(), BAR_WIDTH),
        snapshot.position,
        snapshot.max_position,
        state,
        channels.join(" | ")
    )
}

/// Terminal renderer: one line per update, text or JSON
pub struct TextFeedback<W> {
    out: W,
    json: bool,
    rendered: usize,
}

impl<W: Write + Send> TextFeedback<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            json: false,
            rendered: 0,
        }
    }

    /// Emit each snapshot as a JSON line instead
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> VisualFeedback for TextFeedback<W> {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        let line = if self.json {
            match serde_json::to_string(snapshot) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to serialize snapshot");
                    return;
                }
            }
        } else {
            render_line(snapshot)
        };

        if let Err(e) = writeln!(self.out, "{line}") {
            warn!(error = %e, "failed to write feedback");
            return;
        }
        self.rendered += 1;
    }

    fn finish(&mut self) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelKind, PerChannel};
    use crate::mixer::Availability;
    use crate::session::PlaybackSession;
    use crate::track::Track;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot(position: f64, playing: bool) -> SessionSnapshot {
        let mut rng = StdRng::seed_from_u64(3);
        let tracks = PerChannel::from_fn(|kind| Track::generate(kind, 10, 10.5, 5, &mut rng));
        let mut session = PlaybackSession::new(tracks, 10.5);
        session.set_position(position);
        session.reveal_all(position);
        session.set_enabled(ChannelKind::Bass, false);
        if playing {
            session.set_state(TransportState::Playing);
        }
        session.snapshot(true, |kind| match kind {
            ChannelKind::Vocals => Availability::Unavailable { reason: "missing".into() },
            _ => Availability::Ready,
        })
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0, 4), "[....]");
        assert_eq!(progress_bar(0.5, 4), "[##..]");
        assert_eq!(progress_bar(1.0, 4), "[####]");
        assert_eq!(progress_bar(7.0, 4), "[####]");
    }

    #[test]
    fn test_render_line() {
        let line = render_line(&snapshot(5.3, true));

        assert!(line.starts_with(&format!("[{}{}]", "#".repeat(15), ".".repeat(15))));
        assert!(line.contains(" 5.30/10.50 playing"));
        assert!(line.contains("Drums on 6/10"));
        assert!(line.contains("Bass off 6/10"));
        assert!(line.contains("Vocals n/a 6/10"));
    }

    #[test]
    fn test_text_feedback_writes_lines() {
        let mut feedback = TextFeedback::new(Vec::new());
        feedback.render(&snapshot(0.0, false));
        feedback.render(&snapshot(1.05, true));

        assert_eq!(feedback.rendered(), 2);
        let out = String::from_utf8(feedback.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().next().unwrap().contains("idle"));
    }

    #[test]
    fn test_json_feedback() {
        let mut feedback = TextFeedback::new(Vec::new()).json(true);
        feedback.render(&snapshot(2.1, true));

        let out = String::from_utf8(feedback.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["state"], "playing");
        assert_eq!(value["channels"][1]["enabled"], false);
    }

    #[tokio::test]
    async fn test_spawn_feedback_renders_until_sender_drops() {
        let (tx, rx) = watch::channel(snapshot(0.0, false));
        let task = spawn_feedback(rx, TextFeedback::new(Vec::new()));

        tokio::task::yield_now().await;
        tx.send_replace(snapshot(1.05, true));
        tokio::task::yield_now().await;
        drop(tx);

        let feedback = task.await.unwrap();
        assert!(feedback.rendered() >= 2);
    }
}
