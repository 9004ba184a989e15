//! Scripted input.
//!
//! A line-based format for driving the loop without a window:
//!
//! ```text
//! # frame  command  args
//! 1   lock
//! 2   down KeyW
//! 40  up KeyW
//! 41  look 120 -30
//! 60  resize 800 600
//! 90  unmount
//! ```
//!
//! Events scheduled for frame `n` are posted right before tick `n` runs.
//! Frames must be non-decreasing; blank lines and `#` comments are skipped.

use std::path::Path;

use anyhow::{bail, Context};

use crate::platform::{EventSender, PlatformEvent};

/// One scheduled event.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub frame: u64,
    pub event: PlatformEvent,
}

/// Parsed script with a playback cursor.
#[derive(Debug, Clone, Default)]
pub struct InputScript {
    steps: Vec<ScriptStep>,
    cursor: usize,
}

impl InputScript {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut steps: Vec<ScriptStep> = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let step = parse_line(line).with_context(|| format!("script line {}", idx + 1))?;
            if let Some(prev) = steps.last() {
                if step.frame < prev.frame {
                    bail!(
                        "script line {}: frame {} comes after frame {}",
                        idx + 1,
                        step.frame,
                        prev.frame
                    );
                }
            }
            steps.push(step);
        }
        Ok(Self { steps, cursor: 0 })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parse script {}", path.display()))
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Last frame with a scheduled event.
    pub fn last_frame(&self) -> u64 {
        self.steps.last().map_or(0, |s| s.frame)
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// Posts every event due at or before `frame`. Returns how many were posted.
    pub fn post_due(&mut self, frame: u64, events: &EventSender) -> usize {
        let mut posted = 0;
        while let Some(step) = self.steps.get(self.cursor) {
            if step.frame > frame {
                break;
            }
            if events.post(step.event.clone()) {
                posted += 1;
            }
            self.cursor += 1;
        }
        posted
    }
}

fn parse_line(line: &str) -> anyhow::Result<ScriptStep> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [frame, command, args @ ..] = tokens.as_slice() else {
        bail!("expected `<frame> <command> [args]`");
    };
    let frame: u64 = frame.parse().with_context(|| format!("bad frame `{frame}`"))?;

    let event = match (*command, args) {
        ("down", [code]) => PlatformEvent::KeyDown(code.to_string()),
        ("up", [code]) => PlatformEvent::KeyUp(code.to_string()),
        ("look", [dx, dy]) => PlatformEvent::PointerMove {
            dx: dx.parse().with_context(|| format!("bad dx `{dx}`"))?,
            dy: dy.parse().with_context(|| format!("bad dy `{dy}`"))?,
        },
        ("click", []) => PlatformEvent::Click,
        ("lock", []) => PlatformEvent::PointerLockChanged(true),
        ("unlock", []) => PlatformEvent::PointerLockChanged(false),
        ("blur", []) => PlatformEvent::Blur,
        ("resize", [w, h]) => PlatformEvent::Resize {
            width: w.parse().with_context(|| format!("bad width `{w}`"))?,
            height: h.parse().with_context(|| format!("bad height `{h}`"))?,
        },
        ("unmount", []) => PlatformEvent::Unmount,
        (other, _) => bail!("unknown command `{other}` or wrong argument count"),
    };
    Ok(ScriptStep { frame, event })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::platform_channel;

    #[test]
    fn parses_commands_and_comments() {
        let script = InputScript::parse(
            "# walk then look\n\
             1 lock\n\
             2 down KeyW   # go\n\
             \n\
             5 look 10 -2.5\n\
             9 resize 800 600\n\
             9 unmount\n",
        )
        .unwrap();
        assert_eq!(script.steps().len(), 5);
        assert_eq!(script.steps()[1].event, PlatformEvent::KeyDown("KeyW".into()));
        assert_eq!(
            script.steps()[2].event,
            PlatformEvent::PointerMove { dx: 10.0, dy: -2.5 }
        );
        assert_eq!(script.last_frame(), 9);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(InputScript::parse("x down KeyW").is_err());
        assert!(InputScript::parse("1 fly").is_err());
        assert!(InputScript::parse("1 look 3").is_err());
        assert!(InputScript::parse("5 lock\n2 unlock").is_err());
    }

    #[test]
    fn posts_only_due_steps() {
        let mut script = InputScript::parse("1 down KeyW\n3 up KeyW\n3 down Space").unwrap();
        let (tx, mut rx) = platform_channel();

        assert_eq!(script.post_due(2, &tx), 1);
        assert_eq!(rx.try_next(), Some(PlatformEvent::KeyDown("KeyW".into())));
        assert_eq!(rx.try_next(), None);

        assert_eq!(script.post_due(3, &tx), 2);
        assert!(script.is_finished());
        assert_eq!(script.post_due(10, &tx), 0);
    }
}
