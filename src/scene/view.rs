use super::SceneFrame;
use crate::gesture::Gesture;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Consumes the per-frame transforms and uniforms. Implemented by the rendering host.
pub trait Renderer {
    fn submit(&mut self, frame: &SceneFrame) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Gesture(Gesture),
    Focus(Option<usize>),
    Lightbox(Option<usize>),
}

/// Headless renderer that logs what a viewer would notice changing.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
    last: Option<(Gesture, Option<usize>, Option<usize>)>,
}

impl LogRenderer {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn changes(&mut self, frame: &SceneFrame) -> Vec<Change> {
        let current = (frame.gesture, frame.focused, frame.lightbox());
        let mut changes = Vec::new();

        match self.last {
            None => {
                changes.push(Change::Gesture(current.0));
                changes.push(Change::Focus(current.1));
            }
            Some((gesture, focused, lightbox)) => {
                if gesture != current.0 {
                    changes.push(Change::Gesture(current.0));
                }
                if focused != current.1 {
                    changes.push(Change::Focus(current.1));
                }
                if lightbox != current.2 {
                    changes.push(Change::Lightbox(current.2));
                }
            }
        }

        self.last = Some(current);
        changes
    }
}

impl Renderer for LogRenderer {
    fn submit(&mut self, frame: &SceneFrame) -> Result<(), RenderError> {
        self.frames += 1;

        for change in self.changes(frame) {
            match change {
                Change::Gesture(g) => log::info!("{} ({})", g.caption(), g),
                Change::Focus(Some(i)) => {
                    log::info!("Focused card {} {}", i, frame.cards[i].url)
                }
                Change::Focus(None) => log::info!("Focus cleared"),
                Change::Lightbox(Some(i)) => log::info!("Zoomed card {}", i),
                Change::Lightbox(None) => log::info!("Zoom released"),
            }
        }

        log::debug!(
            "frame {} morph {:.3} rotation {:.3} cursor ({:.2}, {:.2})",
            self.frames,
            frame.particles.morph,
            frame.carousel_rotation,
            frame.cursor.x,
            frame.cursor.y
        );
        Ok(())
    }
}
