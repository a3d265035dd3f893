use anyhow::{anyhow, Result};
use rqrr::PreparedImage;

use super::frame::LumaFrame;

/// Turns a frame into the text of the first readable QR code.
///
/// `Ok(None)`: nothing that looks like a code. `Err`: a code was found but
/// could not be read, which callers treat as a transient per-frame failure.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, frame: &LumaFrame) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RqrrDecoder {
    try_inverted: bool,
}

impl Default for RqrrDecoder {
    fn default() -> Self {
        Self { try_inverted: true }
    }
}

impl RqrrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only look for dark-on-light codes. Halves the work per frame.
    pub fn normal_only() -> Self {
        Self {
            try_inverted: false,
        }
    }

    fn scan(frame: &LumaFrame) -> Result<Option<String>> {
        let mut prepared = PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.pixel(x as u32, y as u32),
        );
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => return Ok(Some(content)),
                Err(err) => last_error = Some(err),
            }
        }
        Err(anyhow!("QR grid found but unreadable: {last_error:?}"))
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode(&self, frame: &LumaFrame) -> Result<Option<String>> {
        match Self::scan(frame) {
            Ok(None) if self.try_inverted => Self::scan(&frame.inverted()),
            outcome => outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrcode::{Color, QrCode};

    const MODULE_PX: usize = 4;
    const QUIET_MODULES: usize = 4;

    /// Dark-on-light code as an RGBA video frame would carry it.
    fn rendered_rgba(payload: &str) -> (u32, Vec<u8>) {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET_MODULES) * MODULE_PX;

        let mut rgba = Vec::with_capacity(side * side * 4);
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
                let inside = (QUIET_MODULES..QUIET_MODULES + modules).contains(&mx)
                    && (QUIET_MODULES..QUIET_MODULES + modules).contains(&my);
                let dark = inside
                    && colors[(my - QUIET_MODULES) * modules + (mx - QUIET_MODULES)] == Color::Dark;
                let value = if dark { 0 } else { 255 };
                rgba.extend_from_slice(&[value, value, value, 255]);
            }
        }
        (side as u32, rgba)
    }

    fn rendered(payload: &str) -> LumaFrame {
        let (side, rgba) = rendered_rgba(payload);
        LumaFrame::from_rgba(side, side, rgba).unwrap()
    }

    #[test]
    fn reads_a_code_from_an_rgba_frame() {
        let frame = rendered("masjid-jamik");
        assert_eq!(
            RqrrDecoder::normal_only().decode(&frame).unwrap().as_deref(),
            Some("masjid-jamik")
        );
        assert_eq!(
            RqrrDecoder::new().decode(&frame).unwrap().as_deref(),
            Some("masjid-jamik")
        );
    }

    #[test]
    fn light_on_dark_codes_need_the_inverted_pass() {
        let frame = rendered("benteng-marlborough").inverted();
        assert_eq!(
            RqrrDecoder::new().decode(&frame).unwrap().as_deref(),
            Some("benteng-marlborough")
        );
        assert!(!matches!(
            RqrrDecoder::normal_only().decode(&frame),
            Ok(Some(_))
        ));
    }

    #[test]
    fn blank_frame_has_no_code() {
        let frame = LumaFrame::new(64, 64, vec![255; 64 * 64]).unwrap();
        assert!(RqrrDecoder::new().decode(&frame).unwrap().is_none());
        assert!(RqrrDecoder::normal_only().decode(&frame).unwrap().is_none());
    }
}
