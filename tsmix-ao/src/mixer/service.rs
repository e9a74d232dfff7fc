//! Background mixer driver
//!
//! Runs a [`Mixer`] on a fixed tick inside a tokio task. Every tick drains as
//! many output periods as the input currently allows. Shutdown is
//! cooperative: [`MixerService::stop`] raises a stop flag and waits for the
//! task to finish its current cycle before destroying the mixer.

use super::{Mixer, MixerStats};
use crate::error::{MixerError, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// Shortest tick accepted by the service
const MIN_TICK: Duration = Duration::from_millis(1);

/// Master volume shared between the control side and the mixer task
///
/// Stored as `f32` bits in an atomic so reads never block the mixer.
#[derive(Debug)]
pub struct VolumeControl {
    bits: AtomicU32,
}

impl VolumeControl {
    /// Create a control at `volume` (clamped to 0.0-1.0)
    pub fn new(volume: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_volume(volume).to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Set the volume (clamped to 0.0-1.0)
    pub fn set(&self, volume: f32) {
        self.bits
            .store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

/// Handle to a mixer running in a background task
#[derive(Debug)]
pub struct MixerService {
    id: Uuid,
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<Mixer>,
}

impl MixerService {
    /// Start driving `mixer` every `tick`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut mixer: Mixer, volume: Arc<VolumeControl>, tick: Duration) -> Self {
        let id = mixer.id();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let task_stop = Arc::clone(&stop_flag);
        let tick = tick.max(MIN_TICK);

        let handle = tokio::spawn(async move {
            info!("Mixer service {} started (tick {:?})", id, tick);

            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while !task_stop.load(Ordering::Acquire) {
                ticker.tick().await;
                if task_stop.load(Ordering::Acquire) {
                    break;
                }

                let published = mixer.run(volume.get());
                if published > 1 {
                    debug!("Mixer {} caught up {} periods in one tick", id, published);
                }
            }

            info!("Mixer service {} stopped", id);
            mixer
        });

        Self {
            id,
            stop_flag,
            handle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the driving task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task after its in-flight cycle, destroy the mixer, and return its counters
    ///
    /// # Errors
    ///
    /// [`MixerError::Task`] if the task panicked or was cancelled.
    pub async fn stop(self) -> Result<MixerStats> {
        info!("Stopping mixer service {}", self.id);
        self.stop_flag.store(true, Ordering::Release);

        let mixer = self
            .handle
            .await
            .map_err(|e| MixerError::Task(format!("mixer {} task failed: {}", self.id, e)))?;

        Ok(mixer.destroy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_clamped() {
        let volume = VolumeControl::new(1.5);
        assert_eq!(volume.get(), 1.0);

        volume.set(-0.2);
        assert_eq!(volume.get(), 0.0);

        volume.set(0.25);
        assert_eq!(volume.get(), 0.25);

        volume.set(f32::NAN);
        assert_eq!(volume.get(), 0.0);
    }
}
