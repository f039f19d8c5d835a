//! Named sample buffers, shared between the control and the audio thread.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use basedrop::{Collector, Handle, Shared, SharedCell};

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Immutable, interleaved sample data with a fixed channel layout.
///
/// Used as grain source (wavetable) and as grain envelope table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Box<[f32]>,
    channel_count: usize,
}

impl SampleBuffer {
    /// Create a new buffer from interleaved samples with the given channel layout.
    pub fn new(samples: Vec<f32>, channel_count: usize) -> Result<Self, Error> {
        if channel_count == 0 {
            return Err(Error::BufferError(
                "Buffer channel count must be > 0".to_string(),
            ));
        }
        if samples.len() % channel_count != 0 {
            return Err(Error::BufferError(format!(
                "Buffer sample count {} is not a multiple of its channel count {}",
                samples.len(),
                channel_count
            )));
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            channel_count,
        })
    }

    /// Create a new single channel buffer.
    pub fn from_mono(samples: Vec<f32>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
            channel_count: 1,
        }
    }

    /// Number of channels of each frame.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Number of sample frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count
    }

    /// True when the buffer contains no frames.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw access to the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Read a single sample at the given frame and channel.
    #[inline]
    pub fn frame(&self, frame: usize, channel: usize) -> f32 {
        debug_assert!(channel < self.channel_count, "Invalid channel index");
        self.samples[frame * self.channel_count + channel]
    }
}

// -------------------------------------------------------------------------------------------------

/// A named, replaceable reference to a [`SampleBuffer`].
///
/// The control thread replaces or clears the referenced buffer, which marks it as modified.
/// The audio thread accesses the buffer via [`lock`](Self::lock), which hands out a scoped
/// [`BufferGuard`] without blocking or allocating. Replaced buffers stay alive until the last
/// guard that still refers to them is dropped; their memory then gets released in the
/// [`basedrop::Collector`] which created the reference's handle.
pub struct BufferRef {
    name: String,
    buffer: SharedCell<Option<SampleBuffer>>,
    modified: AtomicBool,
    handle: Handle,
}

impl BufferRef {
    /// Create a new reference with the given name, which initially refers to no buffer.
    pub fn new<S: Into<String>>(name: S, handle: &Handle) -> Self {
        Self {
            name: name.into(),
            buffer: SharedCell::new(Shared::new(handle, None)),
            modified: AtomicBool::new(false),
            handle: handle.clone(),
        }
    }

    /// Create a new reference with the given name, referring to the given buffer.
    pub fn with_buffer<S: Into<String>>(name: S, buffer: SampleBuffer, handle: &Handle) -> Self {
        Self {
            name: name.into(),
            buffer: SharedCell::new(Shared::new(handle, Some(buffer))),
            modified: AtomicBool::new(false),
            handle: handle.clone(),
        }
    }

    /// The buffer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the referenced buffer and mark the reference as modified.
    pub fn replace(&self, buffer: SampleBuffer) {
        log::debug!(
            "Replacing buffer '{}' with {} frames, {} channels",
            self.name,
            buffer.frame_count(),
            buffer.channel_count()
        );
        self.buffer.set(Shared::new(&self.handle, Some(buffer)));
        self.notify_modified();
    }

    /// Drop the referenced buffer and mark the reference as modified.
    pub fn clear(&self) {
        log::debug!("Clearing buffer '{}'", self.name);
        self.buffer.set(Shared::new(&self.handle, None));
        self.notify_modified();
    }

    /// Mark the buffer as modified, e.g. when it got resized or its content changed.
    pub fn notify_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    /// True when the buffer got modified and the modification was not yet handled.
    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    /// Consume a pending modification. Returns true when the buffer was modified.
    pub(crate) fn take_modified(&self) -> bool {
        self.modified.swap(false, Ordering::AcqRel)
    }

    /// Acquire scoped read access to the currently referenced buffer.
    pub fn lock(&self) -> BufferGuard {
        BufferGuard {
            buffer: self.buffer.get(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Scoped read access to the buffer of a [`BufferRef`]. Released when dropped.
pub struct BufferGuard {
    buffer: Shared<Option<SampleBuffer>>,
}

impl BufferGuard {
    /// The locked buffer, if there is one and it is not empty.
    pub fn get(&self) -> Option<&SampleBuffer> {
        (*self.buffer).as_ref().filter(|buffer| !buffer.is_empty())
    }
}

// -------------------------------------------------------------------------------------------------

/// Resolves buffer names to shared [`BufferRef`]s and owns the [`Collector`] which releases
/// replaced buffers.
///
/// Lives on the control thread: [`collect`](Self::collect) should be called regularly, so
/// buffers which got dropped in the audio thread are freed.
pub struct BufferRegistry {
    collector: Collector,
    buffers: HashMap<String, Arc<BufferRef>>,
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self {
            collector: Collector::new(),
            buffers: HashMap::new(),
        }
    }

    /// Handle to the registry's collector, for creating unregistered buffer references.
    pub fn handle(&self) -> Handle {
        self.collector.handle()
    }

    /// Look up a registered buffer reference.
    pub fn get(&self, name: &str) -> Option<Arc<BufferRef>> {
        self.buffers.get(name).cloned()
    }

    /// Look up a buffer reference, registering a new, empty one if it does not yet exist.
    pub fn get_or_insert(&mut self, name: &str) -> Arc<BufferRef> {
        let handle = self.collector.handle();
        Arc::clone(
            self.buffers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(BufferRef::new(name, &handle))),
        )
    }

    /// Replace the named buffer's content, registering it if needed.
    pub fn replace(&mut self, name: &str, buffer: SampleBuffer) {
        self.get_or_insert(name).replace(buffer);
        self.collect();
    }

    /// Mark the named buffer as modified.
    pub fn notify_modified(&self, name: &str) -> Result<(), Error> {
        self.buffers
            .get(name)
            .map(|buffer| buffer.notify_modified())
            .ok_or_else(|| Error::BufferError(format!("Unknown buffer: '{name}'")))
    }

    /// Remove a buffer reference from the registry. Engines which use it keep their reference.
    pub fn remove(&mut self, name: &str) -> Option<Arc<BufferRef>> {
        self.buffers.remove(name)
    }

    /// Names of all registered buffers.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Release memory of buffers which are no longer in use.
    pub fn collect(&mut self) {
        self.collector.collect();
    }
}

// -------------------------------------------------------------------------------------------------
