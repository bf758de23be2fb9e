//! A render target that records draw commands instead of painting pixels.
//!
//! The HTTP host exposes the recorded commands so a browser can replay them
//! onto a real canvas; tests inspect them directly.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SurfaceError;
use crate::models::ImageSource;
use crate::ports::*;

/// Natural size reported for decoded images; the recorder never reads pixels.
const DEFAULT_IMAGE_SIZE: (f64, f64) = (800.0, 600.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceCommand {
    Clear,
    DrawImage {
        source: ImageSource,
        placement: Placement,
        /// Frames drawn for this image so far.
        frames: u32,
    },
    Message {
        lines: Vec<String>,
    },
    Shape,
    FallbackShape {
        radius: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SurfaceSnapshot {
    pub viewport: Viewport,
    pub commands: Vec<SurfaceCommand>,
}

#[derive(Debug)]
pub struct RecordingSurface {
    viewport: Mutex<Viewport>,
    image_size: (f64, f64),
    commands: Mutex<Vec<SurfaceCommand>>,
}

impl RecordingSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Mutex::new(viewport),
            image_size: DEFAULT_IMAGE_SIZE,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_image_size(mut self, width: f64, height: f64) -> Self {
        self.image_size = (width, height);
        self
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        *self.viewport.lock().expect("surface lock poisoned") = viewport;
    }

    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.commands.lock().expect("surface lock poisoned").clone()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            viewport: self.viewport(),
            commands: self.commands(),
        }
    }

    fn record(&self, command: SurfaceCommand) {
        self.commands
            .lock()
            .expect("surface lock poisoned")
            .push(command);
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

#[async_trait]
impl DrawingSurface for RecordingSurface {
    fn clear(&self) {
        let mut commands = self.commands.lock().expect("surface lock poisoned");
        commands.clear();
        commands.push(SurfaceCommand::Clear);
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock().expect("surface lock poisoned")
    }

    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, SurfaceError> {
        let valid = match source {
            ImageSource::Inline(data) => data.starts_with("data:image/"),
            ImageSource::Url(url) => !url.trim().is_empty(),
        };
        if !valid {
            return Err(SurfaceError("unreadable image source".to_string()));
        }

        Ok(DecodedImage {
            width: self.image_size.0,
            height: self.image_size.1,
            source: source.clone(),
        })
    }

    fn draw_image(&self, image: &DecodedImage, placement: &Placement) {
        let mut commands = self.commands.lock().expect("surface lock poisoned");

        // Successive frames of one fade collapse into a single command.
        if let Some(SurfaceCommand::DrawImage {
            source,
            placement: last,
            frames,
        }) = commands.last_mut()
        {
            if *source == image.source {
                *last = *placement;
                *frames += 1;
                return;
            }
        }

        commands.push(SurfaceCommand::DrawImage {
            source: image.source.clone(),
            placement: *placement,
            frames: 1,
        });
    }

    fn show_message(&self, lines: &[&str]) {
        let mut commands = self.commands.lock().expect("surface lock poisoned");
        commands.clear();
        commands.push(SurfaceCommand::Message {
            lines: lines.iter().map(|line| line.to_string()).collect(),
        });
    }
}

impl ShapeGenerator for RecordingSurface {
    fn generate_with_fade(&self) -> Result<(), SurfaceError> {
        self.record(SurfaceCommand::Shape);
        Ok(())
    }

    fn draw_fallback_shape(&self, radius: f64) -> Result<(), SurfaceError> {
        self.record(SurfaceCommand::FallbackShape { radius });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decode_rejects_non_image_data() {
        let surface = RecordingSurface::default();
        let result = surface
            .decode(&ImageSource::Inline("hello".to_string()))
            .await;
        assert!(result.is_err());

        let image = surface
            .decode(&ImageSource::Inline("data:image/png;base64,AAAA".to_string()))
            .await
            .expect("decode");
        assert_eq!((image.width, image.height), DEFAULT_IMAGE_SIZE);
    }

    #[tokio::test]
    async fn fade_frames_collapse() {
        let surface = RecordingSurface::default();
        let image = surface
            .decode(&ImageSource::Url("https://example.test/a.png".to_string()))
            .await
            .unwrap();
        let placement = Placement {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            opacity: 0.5,
            drift_x: 0.0,
            drift_y: 0.0,
        };

        surface.clear();
        surface.draw_image(&image, &placement);
        surface.draw_image(&image, &placement);

        let commands = surface.commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(
            commands[1],
            SurfaceCommand::DrawImage { frames: 2, .. }
        ));
    }

    #[test]
    fn message_replaces_content() {
        let surface = RecordingSurface::default();
        surface.generate_with_fade().unwrap();
        surface.show_message(&["one", "two"]);
        assert_eq!(
            surface.commands(),
            vec![SurfaceCommand::Message {
                lines: vec!["one".to_string(), "two".to_string()]
            }]
        );
    }
}
