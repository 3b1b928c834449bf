//! Session state: mask lifecycle, detector mode, mirror policy, and
//! video-frame dedup.
//!
//! The session owns the discrete state the compositors read each frame,
//! exposed as an explicit [`RenderState`] value rather than shared
//! globals. The mask state machine is one-way: `NoMask -> MaskLoaded` on
//! successful decode, with clearing defined as starting a new session.

use image::RgbaImage;

use crate::error::Result;
use crate::warp::RenderState;

/// Which detector mode the session is mirroring.
///
/// This mirrors the external face tracker's own mode; the session only
/// uses it to decide the mirror policy and frame dedup behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorMode {
    /// Per-click detection on a static image (not mirrored).
    Image,
    /// Per-frame detection on a live video source.
    Video,
}

/// Mask texture lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    /// No mask supplied yet; compositors draw no texture.
    NoMask,
    /// A mask decoded successfully. There is no transition back.
    MaskLoaded {
        /// Mask width in pixels.
        width: u32,
        /// Mask height in pixels.
        height: u32,
    },
}

/// Per-session state feeding both compositors.
#[derive(Debug, Clone)]
pub struct Session {
    mode: DetectorMode,
    mask: MaskState,
    wireframe_visible: bool,
    /// Whether the video source is a front-facing (naturally mirrored)
    /// camera. Static images are never mirrored.
    mirror_video: bool,
    last_video_time: Option<f64>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a session in image mode with no mask and the wireframe
    /// visible. Video capture defaults to mirrored (front camera).
    pub fn new() -> Self {
        Self {
            mode: DetectorMode::Image,
            mask: MaskState::NoMask,
            wireframe_visible: true,
            mirror_video: true,
            last_video_time: None,
        }
    }

    /// Set whether the video source is mirrored (front-facing camera).
    pub fn with_mirrored_video(mut self, mirrored: bool) -> Self {
        self.mirror_video = mirrored;
        self
    }

    /// Current detector mode.
    pub fn mode(&self) -> DetectorMode {
        self.mode
    }

    /// Current mask state.
    pub fn mask_state(&self) -> MaskState {
        self.mask
    }

    /// Whether the wireframe layer is visible.
    pub fn wireframe_visible(&self) -> bool {
        self.wireframe_visible
    }

    /// Show or hide the wireframe layer.
    pub fn set_wireframe_visible(&mut self, visible: bool) {
        self.wireframe_visible = visible;
    }

    /// Toggle the wireframe layer, returning the new visibility.
    pub fn toggle_wireframe(&mut self) -> bool {
        self.wireframe_visible = !self.wireframe_visible;
        self.wireframe_visible
    }

    /// The mirror flag for the current mode: video from a front camera is
    /// mirrored, static images never are. Decided here once per frame
    /// path and applied to projector and texture sampling alike.
    pub fn mirror(&self) -> bool {
        self.mode == DetectorMode::Video && self.mirror_video
    }

    /// Snapshot the per-frame render flags.
    pub fn render_state(&self) -> RenderState {
        RenderState {
            mask_present: matches!(self.mask, MaskState::MaskLoaded { .. }),
            wireframe_visible: self.wireframe_visible,
            mirror: self.mirror(),
        }
    }

    /// Enter image mode for a per-click detection.
    pub fn begin_image_frame(&mut self) {
        if self.mode != DetectorMode::Image {
            log::debug!("detector mode -> IMAGE");
            self.mode = DetectorMode::Image;
        }
    }

    /// Enter video mode and decide whether the frame at `timestamp`
    /// should be processed.
    ///
    /// Returns `false` when the timestamp equals the last processed one
    /// (a stalled video element re-presenting the same frame); the caller
    /// skips detection and compositing for that callback.
    pub fn begin_video_frame(&mut self, timestamp: f64) -> bool {
        if self.mode != DetectorMode::Video {
            log::debug!("detector mode -> VIDEO");
            self.mode = DetectorMode::Video;
            self.last_video_time = None;
        }
        if self.last_video_time == Some(timestamp) {
            return false;
        }
        self.last_video_time = Some(timestamp);
        true
    }

    /// Decode a mask image and advance to `MaskLoaded`.
    ///
    /// On decode failure the session state is unchanged and the error is
    /// returned for the caller to surface; the compositors never see a
    /// half-loaded mask. On success the decoded image is returned so the
    /// caller can hand it to its compositor.
    pub fn load_mask(&mut self, encoded: &[u8]) -> Result<RgbaImage> {
        let decoded = image::load_from_memory(encoded)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        self.mask = MaskState::MaskLoaded { width, height };
        log::info!("mask loaded ({width}x{height})");
        Ok(decoded)
    }

    /// Record an already-decoded mask image (e.g. generated in memory).
    pub fn mask_loaded(&mut self, mask: &RgbaImage) {
        let (width, height) = mask.dimensions();
        self.mask = MaskState::MaskLoaded { width, height };
        log::info!("mask loaded ({width}x{height})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_initial_state() {
        let session = Session::new();
        assert_eq!(session.mode(), DetectorMode::Image);
        assert_eq!(session.mask_state(), MaskState::NoMask);
        let state = session.render_state();
        assert!(!state.mask_present);
        assert!(state.wireframe_visible);
        assert!(!state.mirror);
    }

    #[test]
    fn test_mirror_policy_per_mode() {
        let mut session = Session::new();
        assert!(!session.mirror());

        session.begin_video_frame(0.0);
        assert!(session.mirror());

        session.begin_image_frame();
        assert!(!session.mirror());

        let mut rear = Session::new().with_mirrored_video(false);
        rear.begin_video_frame(0.0);
        assert!(!rear.mirror());
    }

    #[test]
    fn test_video_frame_dedup() {
        let mut session = Session::new();
        assert!(session.begin_video_frame(1.0));
        assert!(!session.begin_video_frame(1.0));
        assert!(session.begin_video_frame(2.0));
        // Switching modes resets the dedup cursor.
        session.begin_image_frame();
        assert!(session.begin_video_frame(2.0));
    }

    #[test]
    fn test_mask_machine_is_one_way() {
        let mut session = Session::new();
        let mask = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        session.mask_loaded(&mask);
        assert_eq!(
            session.mask_state(),
            MaskState::MaskLoaded {
                width: 4,
                height: 4
            }
        );

        // A failed decode leaves the loaded state untouched.
        assert!(session.load_mask(b"not an image").is_err());
        assert!(matches!(session.mask_state(), MaskState::MaskLoaded { .. }));
    }

    #[test]
    fn test_load_mask_decodes_png() {
        let mut session = Session::new();
        let img = RgbaImage::from_pixel(2, 3, Rgba([9, 8, 7, 255]));
        let mut encoded = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut encoded),
                image::ImageFormat::Png,
            )
            .unwrap();

        let decoded = session.load_mask(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (2, 3));
        assert_eq!(
            session.mask_state(),
            MaskState::MaskLoaded {
                width: 2,
                height: 3
            }
        );
        assert!(session.render_state().mask_present);
    }

    #[test]
    fn test_wireframe_toggle() {
        let mut session = Session::new();
        assert!(!session.toggle_wireframe());
        assert!(session.toggle_wireframe());
        session.set_wireframe_visible(false);
        assert!(!session.render_state().wireframe_visible);
    }
}
