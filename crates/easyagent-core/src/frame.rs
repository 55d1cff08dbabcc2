use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// An embedded screenshot, carried as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub mime: String,
    pub bytes: usize,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not a data URL")]
    NotDataUrl,
    #[error("frame payload is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Frame {
    pub fn new(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_url.is_empty()
    }

    fn parts(&self) -> Result<(&str, &str), FrameError> {
        let rest = self
            .data_url
            .strip_prefix("data:")
            .ok_or(FrameError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(FrameError::NotDataUrl)?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or(FrameError::NotBase64)?;
        let mime = if mime.is_empty() { "text/plain" } else { mime };
        Ok((mime, payload))
    }

    /// Mime type and decoded size, computed without decoding the payload.
    pub fn info(&self) -> Result<FrameInfo, FrameError> {
        let (mime, payload) = self.parts()?;
        let significant = payload.trim_end_matches('=').len();
        Ok(FrameInfo {
            mime: mime.to_string(),
            bytes: significant * 3 / 4,
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>, FrameError> {
        let (_, payload) = self.parts()?;
        Ok(STANDARD.decode(payload)?)
    }

    pub fn extension(&self) -> &'static str {
        match self.parts().map(|(mime, _)| mime) {
            Ok("image/png") => "png",
            Ok("image/jpeg") | Ok("image/jpg") => "jpg",
            Ok("image/webp") => "webp",
            Ok("image/gif") => "gif",
            _ => "bin",
        }
    }
}

impl FrameInfo {
    pub fn size_label(&self) -> String {
        if self.bytes < 1024 {
            format!("{} B", self.bytes)
        } else if self.bytes < 1024 * 1024 {
            format!("{:.1} KiB", self.bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MiB", self.bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn info_reports_mime_and_decoded_size() {
        let frame = Frame::new("data:image/png;base64,aGVsbG8=");
        let info = frame.info().expect("info");
        assert_eq!(info.mime, "image/png");
        assert_eq!(info.bytes, 5);
        assert_eq!(frame.decode().expect("decode"), b"hello".to_vec());
        assert_eq!(frame.extension(), "png");
    }

    #[test]
    fn rejects_urls_that_are_not_base64_data() {
        assert!(matches!(
            Frame::new("https://example.com/a.png").info(),
            Err(FrameError::NotDataUrl)
        ));
        assert!(matches!(
            Frame::new("data:image/png,raw").info(),
            Err(FrameError::NotBase64)
        ));
        assert!(matches!(
            Frame::new("data:image/png;base64,@@@").decode(),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn size_label_scales_units() {
        let info = FrameInfo {
            mime: "image/png".to_string(),
            bytes: 2048,
        };
        assert_eq!(info.size_label(), "2.0 KiB");
    }
}
