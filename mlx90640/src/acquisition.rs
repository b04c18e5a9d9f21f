// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Continuous measurement on a background thread.
//!
//! [`spawn`] moves a [`RegisterProtocol`] onto a new thread that triggers a measurement, then
//! reads and decodes every subpage the camera produces. The most recent [`Frame`] is kept in a
//! single shared slot; consumers always see the newest frame and older frames are never queued.
extern crate std;

use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, trace, warn};

use crate::calculations::FrameDecoder;
use crate::calibration::Calibration;
use crate::clock::Clock;
use crate::common::RAM_WORDS;
use crate::config::AcquisitionConfig;
use crate::error::Error;
use crate::frame::Frame;
use crate::protocol::RegisterProtocol;
use crate::ram::RamSnapshot;
use crate::register::ControlRegister;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,

    /// Set once the acquisition thread has exited, for any reason.
    finished: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,

    frame_ready: Condvar,

    cancel: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, frame: &Frame) {
        let mut slot = self.lock();
        match slot.frame.as_mut() {
            Some(published) => published.clone_from(frame),
            None => slot.frame = Some(frame.clone()),
        }
        drop(slot);
        self.frame_ready.notify_all();
    }

    fn finish(&self) {
        self.lock().finished = true;
        self.frame_ready.notify_all();
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

/// A handle to a running acquisition thread.
///
/// Dropping the handle asks the thread to stop, but does not wait for it.
#[derive(Debug)]
pub struct AcquisitionHandle<E> {
    shared: Arc<Shared>,

    thread: Option<JoinHandle<Result<(), Error<E>>>>,
}

impl<E> AcquisitionHandle<E> {
    /// A copy of the most recently published frame, if any have been published yet.
    pub fn latest(&self) -> Option<Frame> {
        self.shared.lock().frame.clone()
    }

    /// Wait for a frame with a sequence number greater than `after_sequence`.
    ///
    /// Returns `None` if `timeout` passes first, or if the acquisition thread has finished without
    /// publishing a newer frame. Use a sequence of 0 to wait for the first frame.
    pub fn wait_for_frame(&self, after_sequence: u64, timeout: Duration) -> Option<Frame> {
        let guard = self.shared.lock();
        let (slot, _) = self
            .shared
            .frame_ready
            .wait_timeout_while(guard, timeout, |slot| {
                !slot.finished && !is_newer(slot, after_sequence)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if is_newer(&slot, after_sequence) {
            slot.frame.clone()
        } else {
            None
        }
    }

    /// Whether the acquisition thread has exited.
    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    /// Stop the acquisition thread and wait for it to exit.
    ///
    /// The thread checks for cancellation once per measurement, so this can block for up to one
    /// frame period. If the thread had already stopped because of an error, that error is
    /// returned.
    pub fn stop(mut self) -> Result<(), Error<E>> {
        self.shared.cancel.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => Ok(()),
        }
    }
}

impl<E> Drop for AcquisitionHandle<E> {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
    }
}

fn is_newer(slot: &Slot, after_sequence: u64) -> bool {
    slot.frame
        .as_ref()
        .map_or(false, |frame| frame.sequence() > after_sequence)
}

/// Start reading frames from the camera on a new thread.
///
/// The thread owns `protocol` until it exits, so nothing else can access the camera while
/// acquisition is running.
pub fn spawn<T, C>(
    protocol: RegisterProtocol<T, C>,
    calibration: Calibration,
    decoder: FrameDecoder,
    config: AcquisitionConfig,
) -> AcquisitionHandle<T::Error>
where
    T: Transport + Send + 'static,
    T::Error: Debug + Send + 'static,
    C: Clock + Send + 'static,
{
    let shared = Arc::new(Shared::default());
    let thread_shared = Arc::clone(&shared);
    let thread = thread::spawn(move || {
        let result = run(protocol, &calibration, decoder, &config, &thread_shared);
        match &result {
            Ok(()) => debug!("Acquisition stopped"),
            Err(err) => error!("Acquisition stopped: {}", err),
        }
        thread_shared.finish();
        result
    });
    AcquisitionHandle {
        shared,
        thread: Some(thread),
    }
}

fn run<T, C>(
    mut protocol: RegisterProtocol<T, C>,
    calibration: &Calibration,
    mut decoder: FrameDecoder,
    config: &AcquisitionConfig,
    shared: &Shared,
) -> Result<(), Error<T::Error>>
where
    T: Transport,
    C: Clock,
{
    if let Some(frame_rate) = config.frame_rate {
        protocol.set_frame_rate(frame_rate)?;
    }
    let frame_rate = protocol.frame_rate()?;
    let period = frame_rate.period();
    protocol.trigger_measurement()?;
    debug!(
        "Acquisition started at {}Hz ({:?} per subpage)",
        f32::from(frame_rate),
        period
    );
    let mut words = [0u16; RAM_WORDS];
    let mut frame = Frame::new();
    let mut sequence = 0u64;
    while !shared.cancelled() {
        let started = protocol.clock().now();
        let status = protocol.wait_for_data(None)?;
        // Read every cycle, as the access pattern and resolution can be changed at any time.
        let control: ControlRegister = protocol.read_register()?;
        protocol.read_frame(status, &mut words)?;
        let ram = RamSnapshot::from_registers(words, status, control);
        decoder.decode(calibration, &ram, &mut frame)?;
        sequence += 1;
        frame.set_sequence(sequence);
        shared.publish(&frame);
        trace!("Published frame {} (subpage {:?})", sequence, ram.subpage());
        let elapsed = protocol.clock().now().saturating_sub(started);
        match period.checked_sub(elapsed) {
            Some(remaining) => protocol.clock().sleep(remaining),
            None => warn!(
                "Frame {} took {:?}, longer than the {:?} frame period",
                sequence, elapsed, period
            ),
        }
    }
    Ok(())
}
