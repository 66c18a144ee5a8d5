//! Scroll-and-screenshot capture of one page, stitched into a single image
//!
//! The browser is reached only through [`SessionFactory`] and [`Viewport`],
//! so the scroll loop and stitching run unchanged against a scripted
//! document in tests.

use crate::config::ViewportSize;
use crate::error::{NewsError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{imageops, DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// One open browser session
#[async_trait]
pub trait Viewport: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn set_size(&mut self, size: ViewportSize) -> Result<()>;
    /// Encoded screenshot (PNG) of what is currently visible
    async fn capture_viewport(&mut self) -> Result<Vec<u8>>;
    async fn scroll_to(&mut self, offset: u64) -> Result<()>;
    /// Total rendered height of the document
    async fn page_height(&mut self) -> Result<u64>;
    /// Release the session; called exactly once on every exit path
    async fn close(&mut self) -> Result<()>;
}

/// Opens a fresh session per capture
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Viewport>>;
}

/// Stitched full-page raster
#[derive(Debug, Clone)]
pub struct CompositeImage {
    image: RgbImage,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    /// PNG encoded as standard base64, ready for a data URL
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_png()?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Capture `url` as one tall image.
///
/// The session is closed whether the scroll loop, a screenshot, or stitching
/// fails; the first error wins.
#[instrument(level = "info", skip(factory))]
pub async fn capture<F>(
    factory: &F,
    url: &str,
    max_scrolls: u32,
    size: ViewportSize,
) -> Result<CompositeImage>
where
    F: SessionFactory + ?Sized,
{
    if max_scrolls == 0 {
        return Err(NewsError::InvalidConfig(
            "max_scrolls must be at least 1".to_string(),
        ));
    }

    let mut session = factory.open().await?;
    let outcome = scroll_and_stitch(session.as_mut(), url, max_scrolls, size).await;
    let closed = session.close().await;

    match (outcome, closed) {
        (Ok(composite), Ok(())) => {
            info!(
                width = composite.width(),
                height = composite.height(),
                "Screenshot captured"
            );
            Ok(composite)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "Failed to close browser session");
            }
            Err(e)
        }
    }
}

async fn scroll_and_stitch(
    session: &mut dyn Viewport,
    url: &str,
    max_scrolls: u32,
    size: ViewportSize,
) -> Result<CompositeImage> {
    info!(%url, "Navigating");
    session.navigate(url).await?;
    session.set_size(size).await?;

    let chunks = collect_chunks(session, max_scrolls, size.height).await?;
    stitch(&chunks)
}

/// Screenshot, scroll one viewport down, stop once the document no longer
/// extends past the scroll target.
async fn collect_chunks(
    session: &mut dyn Viewport,
    max_scrolls: u32,
    viewport_height: u32,
) -> Result<Vec<Vec<u8>>> {
    let mut chunks = Vec::new();
    for i in 0..max_scrolls {
        debug!(shot = i + 1, of = max_scrolls, "Taking screenshot");
        chunks.push(session.capture_viewport().await?);

        let target = u64::from(viewport_height) * u64::from(i + 1);
        session.scroll_to(target).await?;

        let height = session.page_height().await?;
        if height <= target {
            info!(chunks = chunks.len(), "Reached the end of the page");
            break;
        }
    }
    Ok(chunks)
}

/// Concatenate encoded chunks top to bottom at x = 0.
///
/// Width is the widest chunk, height the sum of all chunks. Narrower chunks
/// leave black background to their right.
pub fn stitch(chunks: &[Vec<u8>]) -> Result<CompositeImage> {
    if chunks.is_empty() {
        return Err(NewsError::Browser("No screenshots captured".to_string()));
    }

    let decoded = chunks
        .iter()
        .map(|bytes| -> Result<RgbImage> { Ok(image::load_from_memory(bytes)?.to_rgb8()) })
        .collect::<Result<Vec<RgbImage>>>()?;

    let width = decoded.iter().map(RgbImage::width).max().unwrap_or(0);
    let height: u32 = decoded.iter().map(RgbImage::height).sum();

    let mut canvas = RgbImage::new(width, height);
    let mut y: i64 = 0;
    for chunk in &decoded {
        imageops::replace(&mut canvas, chunk, 0, y);
        y += i64::from(chunk.height());
    }

    Ok(CompositeImage { image: canvas })
}
