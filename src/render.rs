/*
 *  render.rs
 *
 *  inkboard - slow glass for fast data
 *  (c) 2023-26 inkboard contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */
//! Render coordination and artifact publishing.
//!
//! One periodic consumer projects the store and hands the view to a
//! `Publisher`. The PNG publisher rasterizes the SVG composition, converts
//! it to single-channel grayscale rotated for the portrait panel, and
//! replaces the published file atomically: a render fault of any kind
//! leaves the previous artifact in place, never a truncated one.

use log::{error, info};
use resvg::{
    render,
    usvg::{Options as UsvgOptions, Transform, Tree},
};
use std::fmt::{self, Display};
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tiny_skia::Pixmap;

use chrono_tz::Tz;

use crate::constants::{OUTPUT_FILE, OUTPUT_SCRATCH_FILE, RENDER_INTERVAL};
use crate::store::MeasurementStore;
use crate::sun::Observer;
use crate::template;
use crate::view::{self, RenderedView};

#[derive(Debug)]
pub enum PublishError {
    SvgParseError(String),
    PixmapCreationError(String),
    EncodingError(png::EncodingError),
    Io(std::io::Error),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::SvgParseError(msg) => write!(f, "SVG parse error: {}", msg),
            PublishError::PixmapCreationError(msg) => write!(f, "Pixmap creation error: {}", msg),
            PublishError::EncodingError(e) => write!(f, "PNG encoding error: {}", e),
            PublishError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Io(err)
    }
}

impl From<png::EncodingError> for PublishError {
    fn from(err: png::EncodingError) -> Self {
        PublishError::EncodingError(err)
    }
}

/// Seam between the coordinator and the artifact pipeline.
pub trait Publisher {
    fn publish(&self, view: &RenderedView) -> Result<(), PublishError>;
}

/// Rasterizes the SVG composition and publishes the grayscale PNG.
pub struct PngPublisher {
    out_dir: PathBuf,
    usvg_options: UsvgOptions<'static>,
    /// Also dump the composed SVG beside the artifact (mock mode).
    dump_svg: bool,
}

impl PngPublisher {
    pub fn new(out_dir: PathBuf, dump_svg: bool) -> Self {
        let mut usvg_options = UsvgOptions::default();
        // The panel host has no GUI stack; text needs whatever fonts the OS
        // package manager installed.
        usvg_options.fontdb_mut().load_system_fonts();
        PngPublisher {
            out_dir,
            usvg_options,
            dump_svg,
        }
    }

    fn rasterize(&self, svg: &str) -> Result<Pixmap, PublishError> {
        let tree = Tree::from_str(svg, &self.usvg_options)
            .map_err(|e| PublishError::SvgParseError(format!("{e:?}")))?;
        let size = tree.size();
        let mut pixmap = Pixmap::new(size.width() as u32, size.height() as u32)
            .ok_or_else(|| PublishError::PixmapCreationError("zero-sized viewport".to_string()))?;
        render(&tree, Transform::identity(), &mut pixmap.as_mut());
        Ok(pixmap)
    }

    /// 8-bit luminance, rotated 90° clockwise for the portrait-mounted panel.
    fn grayscale_rotated(pixmap: &Pixmap) -> (Vec<u8>, u32, u32) {
        let (w, h) = (pixmap.width(), pixmap.height());
        let (out_w, out_h) = (h, w);
        let mut gray = vec![0u8; (out_w as usize) * (out_h as usize)];
        for (i, p) in pixmap.pixels().iter().enumerate() {
            let x = i as u32 % w;
            let y = i as u32 / w;
            let luma =
                0.299 * p.red() as f32 + 0.587 * p.green() as f32 + 0.114 * p.blue() as f32;
            gray[(x * out_w + (out_w - 1 - y)) as usize] = luma.min(255.0) as u8;
        }
        (gray, out_w, out_h)
    }

    fn write_atomic(&self, gray: &[u8], width: u32, height: u32) -> Result<(), PublishError> {
        let scratch = self.out_dir.join(OUTPUT_SCRATCH_FILE);
        let target = self.out_dir.join(OUTPUT_FILE);

        let file = fs::File::create(&scratch)?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(gray)?;
        writer.finish()?;

        // Readers polling the target path see either the old complete file
        // or the new complete file, nothing in between.
        fs::rename(&scratch, &target)?;
        Ok(())
    }
}

impl Publisher for PngPublisher {
    fn publish(&self, view: &RenderedView) -> Result<(), PublishError> {
        let svg = template::render_svg(view);
        if self.dump_svg {
            fs::write(self.out_dir.join("debug.svg"), &svg)?;
        }
        let pixmap = self.rasterize(&svg)?;
        let (gray, width, height) = Self::grayscale_rotated(&pixmap);
        self.write_atomic(&gray, width, height)
    }
}

/// One projection/publish cycle. Publishing runs on the blocking pool so a
/// slow rasterization never stalls the producer tasks, and a panicking
/// publisher is contained to its cycle.
async fn cycle(
    publisher: &Arc<dyn Publisher + Send + Sync>,
    store: &MeasurementStore,
    observer: &Observer,
    tz: Tz,
) {
    let view = view::project(store, observer, tz, SystemTime::now());
    let publisher = Arc::clone(publisher);
    match tokio::task::spawn_blocking(move || publisher.publish(&view)).await {
        Ok(Ok(())) => info!("dashboard published; sleeping"),
        Ok(Err(e)) => error!("Failed to publish dashboard: {}", e),
        Err(e) => error!("Publisher panicked: {}", e),
    }
}

/// The render loop: startup delay, then project/publish/sleep forever.
/// Failures are logged and the next cycle runs on schedule; producers are
/// never affected and will have corrected the view by then.
pub async fn run(
    publisher: Arc<dyn Publisher + Send + Sync>,
    store: MeasurementStore,
    observer: Observer,
    tz: Tz,
    startup_delay: Duration,
) {
    tokio::time::sleep(startup_delay).await;
    loop {
        cycle(&publisher, &store, &observer, tz).await;
        tokio::time::sleep(RENDER_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ZoneReadout;
    use chrono_tz::America::Los_Angeles;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn placeholder_view() -> RenderedView {
        RenderedView {
            weather_description: "--".into(),
            weather_code: 0,
            current_date: "Thursday, August 6".into(),
            current_temp: "--".into(),
            is_dark: false,
            daily_temp_high: "--".into(),
            daily_temp_low: "--".into(),
            forecast: Vec::new(),
            graph_min: 0.0,
            graph_max: 100.0,
            nursery: ZoneReadout {
                current: "--".into(),
                high: "--".into(),
                low: "--".into(),
            },
            basement: ZoneReadout {
                current: "--".into(),
                high: "--".into(),
                low: "--".into(),
            },
            aqi: "n/a".into(),
            last_refreshed: "12:05 PM".into(),
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("inkboard-test-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn publish_writes_rotated_grayscale_png_and_removes_scratch() {
        let dir = scratch_dir("publish");
        let publisher = PngPublisher::new(dir.clone(), false);
        publisher.publish(&placeholder_view()).unwrap();

        let target = dir.join(OUTPUT_FILE);
        assert!(target.exists());
        assert!(!dir.join(OUTPUT_SCRATCH_FILE).exists());

        let decoder = png::Decoder::new(fs::File::open(&target).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        // Landscape 1448x1072 composition, portrait 1072x1448 artifact.
        assert_eq!(info.width, crate::constants::VIEWPORT_HEIGHT);
        assert_eq!(info.height, crate::constants::VIEWPORT_WIDTH);
        assert_eq!(info.color_type, png::ColorType::Grayscale);
        assert_eq!(info.bit_depth, png::BitDepth::Eight);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_publish_leaves_previous_artifact() {
        let dir = scratch_dir("previous");
        let publisher = PngPublisher::new(dir.clone(), false);
        publisher.publish(&placeholder_view()).unwrap();
        let before = fs::read(dir.join(OUTPUT_FILE)).unwrap();

        // Second cycle dies before the rename: the scratch file never
        // replaces the artifact.
        let gray = vec![0u8; 4];
        let bad = publisher.write_atomic(&gray, 100, 100); // wrong buffer size
        assert!(bad.is_err());
        assert_eq!(fs::read(dir.join(OUTPUT_FILE)).unwrap(), before);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn grayscale_rotation_transposes_geometry() {
        let mut pixmap = Pixmap::new(4, 2).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        let (gray, w, h) = PngPublisher::grayscale_rotated(&pixmap);
        assert_eq!((w, h), (2, 4));
        assert_eq!(gray.len(), 8);
        assert!(gray.iter().all(|&px| px > 250));
    }

    struct FailingPublisher {
        attempts: Arc<AtomicUsize>,
    }

    impl Publisher for FailingPublisher {
        fn publish(&self, _view: &RenderedView) -> Result<(), PublishError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PublishError::PixmapCreationError("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn cycle_survives_publisher_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let publisher: Arc<dyn Publisher + Send + Sync> = Arc::new(FailingPublisher {
            attempts: Arc::clone(&attempts),
        });
        let store = MeasurementStore::new();
        let observer = Observer {
            latitude: 47.68,
            longitude: -122.35,
        };
        // Two failing cycles in a row complete without propagating anything.
        cycle(&publisher, &store, &observer, Los_Angeles).await;
        cycle(&publisher, &store, &observer, Los_Angeles).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    struct PanickingPublisher;

    impl Publisher for PanickingPublisher {
        fn publish(&self, _view: &RenderedView) -> Result<(), PublishError> {
            panic!("template blew up");
        }
    }

    #[tokio::test]
    async fn cycle_contains_publisher_panic() {
        let publisher: Arc<dyn Publisher + Send + Sync> = Arc::new(PanickingPublisher);
        let store = MeasurementStore::new();
        let observer = Observer {
            latitude: 47.68,
            longitude: -122.35,
        };
        cycle(&publisher, &store, &observer, Los_Angeles).await;
    }
}
