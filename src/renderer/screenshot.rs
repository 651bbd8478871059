//! Asynchronous Screenshot Encoding
//!
//! Backbuffer grabs are handed to a worker thread that flips, encodes and
//! writes the PNG so the frame loop never blocks on disk I/O. The worker
//! has no cancellation path; shutdown joins it after draining the queue.

use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::backend::BackbufferImage;

enum Job {
    Encode(BackbufferImage, PathBuf),
    Shutdown,
}

/// Handle to the encoder thread.
pub struct ScreenshotEncoder {
    sender: flume::Sender<Job>,
    completed: flume::Receiver<PathBuf>,
    worker: Option<JoinHandle<()>>,
}

impl Default for ScreenshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenshotEncoder {
    /// Spawns the worker thread.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded::<Job>();
        let (done_sender, completed) = flume::unbounded::<PathBuf>();

        let worker = std::thread::Builder::new()
            .name("screenshot-encoder".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    match job {
                        Job::Encode(image, path) => {
                            encode_and_write(&image, &path);
                            let _ = done_sender.send(path);
                        }
                        Job::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn screenshot encoder thread");

        Self {
            sender,
            completed,
            worker: Some(worker),
        }
    }

    /// Default output path: `screenshots/YYYYMMDD-HHMMSS.png`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        PathBuf::from("screenshots").join(format!("{stamp}.png"))
    }

    /// Queues one grab for encoding.
    pub fn submit(&self, image: BackbufferImage, path: PathBuf) {
        log::info!("Saving screenshot to {}", path.display());
        let _ = self.sender.send(Job::Encode(image, path));
    }

    /// Polls finished writes; called from `Renderer::update`.
    pub fn poll_completed(&self) -> Vec<PathBuf> {
        let mut done = Vec::new();
        while let Ok(path) = self.completed.try_recv() {
            log::info!("Screenshot saved: {}", path.display());
            done.push(path);
        }
        done
    }
}

impl Drop for ScreenshotEncoder {
    fn drop(&mut self) {
        let _ = self.sender.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn encode_and_write(image: &BackbufferImage, path: &PathBuf) {
    if image.width == 0 || image.height == 0 {
        log::warn!("Empty backbuffer grab; skipping screenshot");
        return;
    }

    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create screenshot directory: {e}");
            return;
        }
    }

    let mut pixels = image.pixels.clone();

    // PNG rows run top-down; flip when the backend's framebuffer origin is
    // the bottom-left.
    if image.origin_bottom_left {
        let row_bytes = image.width as usize * 3;
        let rows = image.height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = pixels.split_at_mut((rows - 1 - y) * row_bytes);
            top[y * row_bytes..y * row_bytes + row_bytes]
                .swap_with_slice(&mut bottom[..row_bytes]);
        }
    }

    match image::RgbImage::from_raw(image.width, image.height, pixels) {
        Some(img) => {
            if let Err(e) = img.save(path) {
                log::error!("Failed to write screenshot {}: {e}", path.display());
            }
        }
        None => log::error!("Backbuffer grab has wrong byte count; skipping screenshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_timestamped_png() {
        let path = ScreenshotEncoder::default_path();
        assert!(path.starts_with("screenshots"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".png"));
        // YYYYMMDD-HHMMSS.png
        assert_eq!(name.len(), "00000000-000000.png".len());
    }
}
