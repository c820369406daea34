//! Presentation seam.
//!
//! Window-system integration lives outside the crate; renderers talk to
//! this trait. [`HeadlessSwapchain`] backs tests and offscreen use.

use crate::error::GfxResult;
use crate::sync::SemaphoreId;

/// A rotating set of presentable images.
pub trait Swapchain: Send + Sync {
    fn image_count(&self) -> u32;

    fn extent(&self) -> (u32, u32);

    /// Index of the next image to render into. Implementations return
    /// [`crate::GfxError::SwapchainOutOfDate`] after a surface size change
    /// until `resize` is called.
    fn acquire(&mut self) -> GfxResult<u32>;

    /// Queue the image for presentation. `wait` is the semaphore of the
    /// frame's last submission, usually [`crate::Queue::last_signal`].
    fn present(&mut self, image: u32, wait: Option<SemaphoreId>) -> GfxResult<()>;

    fn resize(&mut self, width: u32, height: u32) -> GfxResult<()>;
}

/// Swapchain with no surface behind it; images are plain indices.
#[derive(Debug)]
pub struct HeadlessSwapchain {
    image_count: u32,
    next: u32,
    extent: (u32, u32),
}

impl HeadlessSwapchain {
    pub fn new(image_count: u32, width: u32, height: u32) -> Self {
        Self {
            image_count: image_count.max(1),
            next: 0,
            extent: (width, height),
        }
    }
}

impl Swapchain for HeadlessSwapchain {
    fn image_count(&self) -> u32 {
        self.image_count
    }

    fn extent(&self) -> (u32, u32) {
        self.extent
    }

    fn acquire(&mut self) -> GfxResult<u32> {
        let image = self.next;
        self.next = (self.next + 1) % self.image_count;
        Ok(image)
    }

    fn present(&mut self, image: u32, wait: Option<SemaphoreId>) -> GfxResult<()> {
        log::trace!("present: image {image}, wait {wait:?}");
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> GfxResult<()> {
        self.extent = (width, height);
        self.next = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_rotate() {
        let mut swapchain = HeadlessSwapchain::new(3, 64, 64);
        assert_eq!(swapchain.acquire().unwrap(), 0);
        assert_eq!(swapchain.acquire().unwrap(), 1);
        assert_eq!(swapchain.acquire().unwrap(), 2);
        assert_eq!(swapchain.acquire().unwrap(), 0);
    }
}
