//! Turns poll status into display frames.
//!
//! The presenter never touches the scheduler's state: it formats a
//! [`StatusSnapshot`] into a [`Frame`] and hands it to a [`Renderer`], the
//! external capability driving the LED matrix.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DisplayConfig;
use crate::scheduler::StatusSnapshot;

/// Separator between the viewer and follower counts.
pub const SEPARATOR: &str = " · ";
/// Appended to the text when the shown data is stale.
pub const STALE_MARKER: &str = "…";

pub const CONNECTING_TEXT: &str = "Connecting…";
pub const CONFIG_ERROR_TEXT: &str = "Twitch login failed - check credentials";
pub const SHUTDOWN_TEXT: &str = "Bye!";

/// Horizontal text alignment within a zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

/// Text animation used when a frame is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEffect {
    /// Show the text in place.
    #[default]
    Print,
    ScrollLeft,
    ScrollRight,
    ScrollUp,
    ScrollDown,
    Fade,
}

/// Which glyph accompanies the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphKind {
    /// Fresh statistics are on screen.
    Heart,
    /// Brand mark, used while connecting, offline, stale or failing.
    Brand,
}

/// Opaque column bitmap handed through to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    pub kind: GlyphKind,
    pub bitmap: Arc<[u8]>,
}

/// Glyph placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub zone: u8,
    pub glyph: Glyph,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub text_zone: u8,
    pub icon: Option<Icon>,
    pub alignment: Alignment,
    pub effect: TextEffect,
    pub speed_ms: u16,
    pub pause_ms: u16,
}

/// External display capability. Fire-and-forget, once per frame.
pub trait Renderer: Send {
    fn render(&mut self, frame: &Frame);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, frame: &Frame) {
        (**self).render(frame)
    }
}

/// Formats channel statistics and connection state for the matrix.
#[derive(Debug, Clone)]
pub struct DisplayPresenter {
    config: DisplayConfig,
    channel_login: String,
    heart: Arc<[u8]>,
    brand: Arc<[u8]>,
}

impl DisplayPresenter {
    pub fn new(config: DisplayConfig, channel_login: impl Into<String>) -> Self {
        let heart = Arc::from(config.heart.as_slice());
        let brand = Arc::from(config.brand.as_slice());
        Self {
            config,
            channel_login: channel_login.into(),
            heart,
            brand,
        }
    }

    /// Text shown for `status`, without layout.
    pub fn text_for(&self, status: &StatusSnapshot) -> String {
        if status.config_error() {
            return CONFIG_ERROR_TEXT.to_string();
        }
        if status.channel_missing() {
            return format!("{} not found", self.channel_login);
        }
        match status.stats.as_deref() {
            Some(stats) => {
                let viewers = if stats.is_live {
                    format!("{} viewers", stats.viewer_count)
                } else {
                    "offline".to_string()
                };
                let mut text = format!("{viewers}{SEPARATOR}{} followers", stats.follower_count);
                if status.stale {
                    text.push_str(STALE_MARKER);
                }
                text
            }
            None => CONNECTING_TEXT.to_string(),
        }
    }

    fn glyph_for(&self, status: &StatusSnapshot) -> GlyphKind {
        let fresh_live = status
            .stats
            .as_deref()
            .is_some_and(|stats| stats.is_live && !status.stale);
        if fresh_live && !status.config_error() && !status.channel_missing() {
            GlyphKind::Heart
        } else {
            GlyphKind::Brand
        }
    }

    /// Build the frame for the current status.
    pub fn render_frame(&self, status: &StatusSnapshot) -> Frame {
        let kind = self.glyph_for(status);
        self.frame(self.text_for(status), Some(kind))
    }

    /// Frame shown when the ticker stops.
    pub fn shutdown_frame(&self) -> Frame {
        self.frame(SHUTDOWN_TEXT.to_string(), None)
    }

    fn frame(&self, text: String, glyph: Option<GlyphKind>) -> Frame {
        // Zone 0 holds the glyph, the last zone the text. A single zone is all text.
        let text_zone = self.config.zones.saturating_sub(1);
        let icon = glyph.filter(|_| text_zone > 0).and_then(|kind| {
            let bitmap = match kind {
                GlyphKind::Heart => self.heart.clone(),
                GlyphKind::Brand => self.brand.clone(),
            };
            if bitmap.is_empty() {
                return None;
            }
            Some(Icon {
                zone: 0,
                glyph: Glyph { kind, bitmap },
            })
        });

        Frame {
            text,
            text_zone,
            icon,
            alignment: self.config.alignment,
            effect: self.config.effect,
            speed_ms: self.config.scroll_speed_ms,
            pause_ms: self.config.scroll_pause_ms,
        }
    }
}
