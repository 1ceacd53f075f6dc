//! Frame source abstraction and its scoped acquisition guard.

use crate::frame::Frame;

/// A stream of frames that must be opened before use and closed after.
pub trait FrameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Acquire the underlying resource (camera, directory, ...).
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;

    /// Release the resource. Must be safe to call on an unopened source.
    fn close(&mut self);
}

/// An opened [`FrameSource`], closed again when the guard drops.
pub struct OpenSource<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<'a, S: FrameSource> OpenSource<'a, S> {
    pub fn open(source: &'a mut S) -> Result<Self, S::Error> {
        source.open()?;
        Ok(Self { source })
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, S::Error> {
        self.source.next_frame()
    }
}

impl<S: FrameSource> Drop for OpenSource<'_, S> {
    fn drop(&mut self) {
        self.source.close();
        tracing::debug!("frame source closed");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory frame source shared by the session tests.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    pub struct FakeSourceError(pub String);

    #[derive(Default)]
    pub struct FakeSource {
        pub frames: VecDeque<Frame>,
        pub fail_open: bool,
        /// Fail `next_frame` once this many frames have been handed out.
        pub fail_after: Option<usize>,
        pub opened: usize,
        pub closed: usize,
        pub served: usize,
    }

    impl FakeSource {
        pub fn with_frames(count: usize) -> Self {
            let frames = (0..count)
                .map(|i| Frame { data: vec![0; 64 * 48], width: 64, height: 48, sequence: i as u32 })
                .collect();
            Self { frames, ..Default::default() }
        }
    }

    impl FrameSource for FakeSource {
        type Error = FakeSourceError;

        fn open(&mut self) -> Result<(), Self::Error> {
            if self.fail_open {
                return Err(FakeSourceError("cannot open camera".into()));
            }
            self.opened += 1;
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
            if self.fail_after == Some(self.served) {
                return Err(FakeSourceError("device unplugged".into()));
            }
            let frame = self.frames.pop_front();
            if frame.is_some() {
                self.served += 1;
            }
            Ok(frame)
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }
}
