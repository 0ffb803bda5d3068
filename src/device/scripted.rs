//! Scripted device for exercising the capture loop without hardware
//!
//! Open and read outcomes are queued up front. Frames are tiny tagged
//! MJPEG payloads (`FF D8 <id:u32be> FF D9`) that the encoder passes through
//! unchanged, so a test can tell exactly which device frame reached the
//! store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CaptureDevice, DeviceConfig, DeviceError, DeviceHandle, HandleInfo, PixelFormat, RawFrame};

/// Outcome of one scripted `read_frame` call
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// Return this frame
    Frame(RawFrame),
    /// Return the next tagged frame
    Tagged,
    /// Fail with `ReadFailed`
    Fail(String),
    /// Block for the given time, then return the next tagged frame
    Stall(Duration),
}

/// What happens once the read script runs dry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhausted {
    /// Keep producing tagged frames
    Frames,
    /// Fail every read
    Fail,
}

#[derive(Debug)]
struct Script {
    opens: VecDeque<bool>,
    always_unavailable: bool,
    reads: VecDeque<ReadOutcome>,
    exhausted: Exhausted,
    next_tag: u32,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicU64,
    failed_opens: AtomicU64,
    releases: AtomicU64,
    reads: AtomicU64,
}

/// Capture device driven by a script
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
    in_use: Arc<AtomicBool>,
}

impl ScriptedDevice {
    /// Device that opens every time and produces tagged frames forever
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                opens: VecDeque::new(),
                always_unavailable: false,
                reads: VecDeque::new(),
                exhausted: Exhausted::Frames,
                next_tag: 1,
            })),
            counters: Arc::new(Counters::default()),
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Device whose `open` always fails
    pub fn never_opens() -> Self {
        let device = Self::new();
        device.lock().always_unavailable = true;
        device
    }

    /// Fail the next `count` opens
    pub fn fail_opens(self, count: usize) -> Self {
        self.lock().opens.extend(std::iter::repeat(false).take(count));
        self
    }

    /// Queue `count` successful tagged reads
    pub fn frames(self, count: usize) -> Self {
        self.lock()
            .reads
            .extend(std::iter::repeat(ReadOutcome::Tagged).take(count));
        self
    }

    /// Queue one read failure
    pub fn fail_read(self, reason: impl Into<String>) -> Self {
        self.lock().reads.push_back(ReadOutcome::Fail(reason.into()));
        self
    }

    /// Queue an arbitrary read outcome
    pub fn then(self, outcome: ReadOutcome) -> Self {
        self.lock().reads.push_back(outcome);
        self
    }

    /// Set the behaviour once the read script is exhausted
    pub fn when_exhausted(self, exhausted: Exhausted) -> Self {
        self.lock().exhausted = exhausted;
        self
    }

    /// Successful opens so far
    pub fn open_count(&self) -> u64 {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Failed opens so far
    pub fn failed_open_count(&self) -> u64 {
        self.counters.failed_opens.load(Ordering::SeqCst)
    }

    /// Handles released so far
    pub fn release_count(&self) -> u64 {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// `read_frame` calls so far
    pub fn read_count(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Build the tagged MJPEG payload for a frame id
    pub fn tagged_payload(tag: u32) -> Vec<u8> {
        let mut payload = vec![0xFF, 0xD8];
        payload.extend_from_slice(&tag.to_be_bytes());
        payload.extend_from_slice(&[0xFF, 0xD9]);
        payload
    }

    /// Recover the frame id from a tagged payload
    pub fn tag_of(payload: &[u8]) -> Option<u32> {
        match payload {
            [0xFF, 0xD8, a, b, c, d, 0xFF, 0xD9] => Some(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A panicking test thread must not wedge the other users of the script
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&self, config: &DeviceConfig) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        let allowed = {
            let mut script = self.lock();
            !script.always_unavailable && script.opens.pop_front().unwrap_or(true)
        };

        if !allowed {
            self.counters.failed_opens.fetch_add(1, Ordering::SeqCst);
            return Err(DeviceError::unavailable(&config.path, "scripted open failure"));
        }
        if self
            .in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.counters.failed_opens.fetch_add(1, Ordering::SeqCst);
            return Err(DeviceError::unavailable(&config.path, "device busy"));
        }

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedHandle {
            info: HandleInfo {
                path: config.path.clone(),
                width: config.width,
                height: config.height,
                fps: config.fps,
                format: PixelFormat::Mjpeg,
            },
            device: self.clone(),
        }))
    }
}

struct ScriptedHandle {
    info: HandleInfo,
    device: ScriptedDevice,
}

impl ScriptedHandle {
    fn tagged(&self, script: &mut Script) -> RawFrame {
        let tag = script.next_tag;
        script.next_tag += 1;
        RawFrame::new(
            self.info.width,
            self.info.height,
            PixelFormat::Mjpeg,
            ScriptedDevice::tagged_payload(tag),
        )
    }
}

impl DeviceHandle for ScriptedHandle {
    fn info(&self) -> &HandleInfo {
        &self.info
    }

    fn read_frame(&mut self) -> Result<RawFrame, DeviceError> {
        self.device.counters.reads.fetch_add(1, Ordering::SeqCst);

        let outcome = {
            let mut script = self.device.lock();
            let next = script.reads.pop_front();
            match next {
                Some(outcome) => outcome,
                None if script.exhausted == Exhausted::Fail => {
                    ReadOutcome::Fail("script exhausted".into())
                }
                None => ReadOutcome::Tagged,
            }
        };

        match outcome {
            ReadOutcome::Frame(frame) => Ok(frame),
            ReadOutcome::Tagged => Ok(self.tagged(&mut self.device.lock())),
            ReadOutcome::Fail(reason) => Err(DeviceError::read_failed(&self.info.path, reason)),
            ReadOutcome::Stall(duration) => {
                std::thread::sleep(duration);
                Ok(self.tagged(&mut self.device.lock()))
            }
        }
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.device.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.device.in_use.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeviceConfig {
        DeviceConfig::with_path("scripted://0")
    }

    #[test]
    fn test_tagged_payload() {
        let payload = ScriptedDevice::tagged_payload(42);
        assert_eq!(ScriptedDevice::tag_of(&payload), Some(42));
        assert_eq!(ScriptedDevice::tag_of(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_script_order() {
        let device = ScriptedDevice::new()
            .fail_opens(1)
            .frames(2)
            .fail_read("unplugged")
            .when_exhausted(Exhausted::Fail);

        assert!(device.open(&config()).is_err());
        let mut handle = device.open(&config()).unwrap();

        let first = handle.read_frame().unwrap();
        let second = handle.read_frame().unwrap();
        assert_eq!(ScriptedDevice::tag_of(&first.data), Some(1));
        assert_eq!(ScriptedDevice::tag_of(&second.data), Some(2));
        assert!(matches!(
            handle.read_frame(),
            Err(DeviceError::ReadFailed { .. })
        ));
        assert!(handle.read_frame().is_err());

        handle.release();
        assert_eq!(device.open_count(), 1);
        assert_eq!(device.failed_open_count(), 1);
        assert_eq!(device.release_count(), 1);
        assert_eq!(device.read_count(), 4);
    }

    #[test]
    fn test_never_opens() {
        let device = ScriptedDevice::never_opens();
        for _ in 0..3 {
            assert!(device.open(&config()).is_err());
        }
        assert_eq!(device.failed_open_count(), 3);
        assert!(!device.is_open());
    }
}
