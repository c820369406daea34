//! The graphics queue and its submission chain.
//!
//! Submissions within one frame are chained: each waits on the semaphore
//! the previous one signaled, so GPU work retires in submission order.
//! [`Queue::depart`] closes the frame, recycling the chain so the next
//! frame's first submission waits on nothing.

use parking_lot::Mutex;

use crate::command::CommandBuffer;
use crate::device::BackendRef;
use crate::error::{GfxError, GfxResult};
use crate::sync::{Fence, FencePool, SemaphoreId, SemaphorePool};
use crate::types::CommandBufferKind;

/// Sync objects attached to one submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Semaphore waited on before execution; `None` for the first
    /// submission of a frame.
    pub wait: Option<SemaphoreId>,
    /// Semaphore signaled on completion; the next submission waits on it.
    pub signal: SemaphoreId,
    /// Signals when every command buffer in the submission has retired.
    pub fence: Fence,
}

/// Lifetime counters for the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueTotals {
    pub submissions: u64,
    pub draw_calls: u64,
    pub instances: u64,
    pub triangles: u64,
}

#[derive(Debug)]
struct Chain {
    next_wait: Option<SemaphoreId>,
    next_signal: SemaphoreId,
    /// Everything handed out since the last depart.
    in_flight: Vec<SemaphoreId>,
    /// Fences of the same submissions; the last one gates reclamation.
    fences: Vec<Fence>,
}

#[derive(Debug)]
pub struct Queue {
    backend: BackendRef,
    semaphores: SemaphorePool,
    fences: FencePool,
    chain: Mutex<Chain>,
    totals: Mutex<QueueTotals>,
}

impl Queue {
    pub(crate) fn new(backend: BackendRef) -> Self {
        let semaphores = SemaphorePool::new();
        let next_signal = semaphores.alloc();
        Self {
            backend,
            semaphores,
            fences: FencePool::new(),
            chain: Mutex::new(Chain {
                next_wait: None,
                next_signal,
                in_flight: Vec::new(),
                fences: Vec::new(),
            }),
            totals: Mutex::new(QueueTotals::default()),
        }
    }

    /// Submit ended primary command buffers as one batch.
    ///
    /// Each buffer gets its own native submission and chain link, so work
    /// retires in order even within the batch. The returned fence guards the
    /// last of them; the buffers stay pending until it signals.
    pub fn submit(&self, command_buffers: &mut [CommandBuffer]) -> GfxResult<Submission> {
        if let Some(bad) = command_buffers
            .iter()
            .find(|cb| cb.kind() != CommandBufferKind::Primary || !cb.is_executable())
        {
            return Err(GfxError::SubmitFailed(format!(
                "command buffer {:?} is not an ended primary",
                bad.kind()
            )));
        }

        let fence = self.fences.alloc();
        let links: Vec<(Option<SemaphoreId>, SemaphoreId)> = {
            let mut chain = self.chain.lock();
            let count = command_buffers.len().max(1);
            let links = (0..count)
                .map(|_| {
                    let wait = chain.next_wait.take();
                    let signal = chain.next_signal;
                    chain.next_wait = Some(signal);
                    chain.next_signal = self.semaphores.alloc();
                    chain.in_flight.push(signal);
                    (wait, signal)
                })
                .collect();
            chain.fences.push(fence.clone());
            links
        };
        let wait = links[0].0;
        let signal = links[links.len() - 1].1;

        match &self.backend {
            BackendRef::Gles(ctx) => {
                // GLES has no deferred execution; flushing completes the
                // submission, semaphores are bookkeeping only.
                ctx.driver().flush();
                fence.signal();
            }
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => {
                if command_buffers.is_empty() {
                    ctx.submit(&[], wait, signal, Some(&fence))?;
                } else {
                    let last = command_buffers.len() - 1;
                    for (index, (cb, link)) in
                        command_buffers.iter().zip(&links).enumerate()
                    {
                        let attach = (index == last).then_some(&fence);
                        ctx.submit(&[cb.id()], link.0, link.1, attach)?;
                    }
                }
            }
        }

        {
            let mut totals = self.totals.lock();
            totals.submissions += 1;
            for cb in command_buffers.iter() {
                let stats = cb.stats();
                totals.draw_calls += stats.draw_calls as u64;
                totals.instances += stats.instances as u64;
                totals.triangles += stats.triangles;
            }
        }
        for cb in command_buffers.iter_mut() {
            cb.mark_pending(fence.clone());
        }

        log::trace!(
            "submit: {} command buffer(s), wait={:?} signal={:?}",
            command_buffers.len(),
            wait,
            signal
        );
        Ok(Submission {
            wait,
            signal,
            fence,
        })
    }

    /// Close the current frame's submission chain. The next submission
    /// waits on nothing; once the frame's last fence has landed, its
    /// semaphores and fences return to their pools.
    pub fn depart(&self) {
        let mut chain = self.chain.lock();
        chain.next_wait = None;
        if let Some(last) = chain.fences.last().cloned() {
            if !last.is_signaled() {
                self.wait_fence(&last);
            }
            if !last.is_signaled() {
                // Still in flight; a later depart reclaims them.
                log::warn!("depart: last submission has not retired, keeping sync objects");
                return;
            }
        }
        let in_flight = std::mem::take(&mut chain.in_flight);
        self.semaphores.recycle(in_flight);
        for fence in std::mem::take(&mut chain.fences) {
            #[cfg(feature = "vulkan-backend")]
            if let BackendRef::Vulkan(ctx) = &self.backend {
                ctx.reclaim_fence(&fence);
            }
            self.fences.recycle(fence);
        }
    }

    /// Submissions retire in queue order, so waiting on the frame's last
    /// fence covers every earlier one.
    fn wait_fence(&self, fence: &Fence) {
        match &self.backend {
            // GLES submissions complete at submit.
            BackendRef::Gles(_) => {}
            #[cfg(feature = "vulkan-backend")]
            BackendRef::Vulkan(ctx) => ctx.wait_fence(fence),
        }
    }

    /// The semaphore signaled by the most recent submission, if any since
    /// the last depart. This is what presentation should wait on.
    pub fn last_signal(&self) -> Option<SemaphoreId> {
        self.chain.lock().next_wait
    }

    pub fn totals(&self) -> QueueTotals {
        *self.totals.lock()
    }
}
