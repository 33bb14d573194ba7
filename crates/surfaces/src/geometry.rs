//! Keeps the active surface's bounds in step with the host window.
//!
//! The host's layout owner knows where the tool area sits. On every trigger
//! we ask it (`request-bounds`), wait a short while for the answer, and fall
//! back to the full content rectangle if none arrives.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    serde::{Deserialize, Serialize},
    tokio::sync::{Mutex, oneshot},
    toolbay_config::GeometryConfig,
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use toolbay_metrics::{counter, geometry as geometry_metrics};

use crate::{registry::SurfaceRegistry, surface::HostMessage};

/// A clamped, applied rectangle in content coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// A `bounds-response` as reported by the layout owner. Values may be
/// negative or overflow the window; [`clamp_bounds`] fixes that up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RawBounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl RawBounds {
    /// Parse a response payload. Anything that is not an object with four
    /// integral fields is treated as no answer.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let field = |name: &str| {
            let v = value.get(name)?;
            v.as_i64()
                .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
        };
        Some(Self {
            x: field("x")?,
            y: field("y")?,
            width: field("width")?,
            height: field("height")?,
        })
    }
}

/// Clamp a reported rectangle into a `content_width` × `content_height`
/// window: the origin stays inside the window and the size fits in the space
/// left from the origin, never below one pixel.
#[must_use]
pub fn clamp_bounds(raw: RawBounds, content_width: u32, content_height: u32) -> Bounds {
    let (x, width) = clamp_axis(raw.x, raw.width, content_width);
    let (y, height) = clamp_axis(raw.y, raw.height, content_height);
    Bounds {
        x,
        y,
        width,
        height,
    }
}

fn clamp_axis(origin: i64, size: i64, extent: u32) -> (u32, u32) {
    let extent = i64::from(extent.max(1));
    let origin = origin.clamp(0, extent - 1);
    let size = size.clamp(1, extent - origin);
    // Both values now lie in 0..=u32::MAX.
    (
        u32::try_from(origin).unwrap_or(0),
        u32::try_from(size).unwrap_or(1),
    )
}

/// What prompted a recomputation. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryTrigger {
    Resize,
    Move,
    Maximize,
    Unmaximize,
    EnterFullscreen,
    LeaveFullscreen,
    Focus,
    Show,
    PanelVisibility,
    SurfaceSwitch,
}

/// The host window as seen by the synchronizer.
pub trait HostWindow: Send + Sync {
    /// Current content-area size in pixels.
    fn content_size(&self) -> (u32, u32);
    /// Emit `request-bounds {requestId}` to the layout owner. The answer
    /// comes back through [`GeometrySynchronizer::on_bounds_response`].
    fn request_bounds(&self, request_id: u64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied(Bounds),
    /// The layout owner did not answer in time or answered garbage.
    Fallback(Bounds),
    NoActiveSurface,
}

pub struct GeometrySynchronizer {
    registry: Arc<SurfaceRegistry>,
    window: Arc<dyn HostWindow>,
    frame_interval: Duration,
    response_timeout: Duration,
    scheduled: AtomicBool,
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Option<RawBounds>>>>,
}

impl GeometrySynchronizer {
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        window: Arc<dyn HostWindow>,
        config: &GeometryConfig,
    ) -> Self {
        Self {
            registry,
            window,
            frame_interval: config.frame_interval(),
            response_timeout: config.response_timeout(),
            scheduled: AtomicBool::new(false),
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule a recomputation at the end of the current frame. Triggers
    /// that arrive while one is already scheduled fold into it.
    pub fn schedule(self: &Arc<Self>, trigger: GeometryTrigger) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            trace!(?trigger, "geometry sync already scheduled");
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.frame_interval).await;
            this.scheduled.store(false, Ordering::Release);
            this.sync_now(trigger).await;
        });
    }

    /// Run one bounds round trip immediately.
    pub async fn sync_now(&self, trigger: GeometryTrigger) -> SyncOutcome {
        if self.registry.active_surface().await.is_none() {
            trace!(?trigger, "no active surface, skipping geometry sync");
            return SyncOutcome::NoActiveSurface;
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);
        debug!(request_id, ?trigger, "requesting bounds");
        #[cfg(feature = "metrics")]
        counter!(geometry_metrics::REQUESTS_TOTAL).increment(1);
        self.window.request_bounds(request_id);

        let answer = match tokio::time::timeout(self.response_timeout, rx).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(request_id, timeout_ms = self.response_timeout.as_millis() as u64, "bounds request timed out");
                None
            },
        };
        self.pending.lock().await.remove(&request_id);

        let (width, height) = self.window.content_size();
        // Re-read the active slot: it may have changed while we waited.
        let Some((instance_id, surface)) = self.registry.active_surface().await else {
            return SyncOutcome::NoActiveSurface;
        };

        match answer {
            Some(raw) => {
                let bounds = clamp_bounds(raw, width, height);
                debug!(request_id, instance_id = %instance_id, ?bounds, "applying bounds");
                surface.set_bounds(bounds);
                SyncOutcome::Applied(bounds)
            },
            None => {
                let bounds = Bounds::full(width, height);
                debug!(request_id, instance_id = %instance_id, ?bounds, "falling back to full content area");
                #[cfg(feature = "metrics")]
                counter!(geometry_metrics::FALLBACKS_TOTAL).increment(1);
                surface.set_bounds(bounds);
                let resized = HostMessage::ViewportResized {
                    width: bounds.width,
                    height: bounds.height,
                };
                if let Err(e) = surface.post_message(&resized) {
                    warn!(instance_id = %instance_id, error = %e, "failed to notify viewport resize");
                }
                SyncOutcome::Fallback(bounds)
            },
        }
    }

    /// Deliver a `bounds-response`. `payload` of `None` (or an unparsable
    /// one) triggers the fallback right away. Returns `false` when the
    /// request is unknown or already settled.
    pub async fn on_bounds_response(
        &self,
        request_id: u64,
        payload: Option<&serde_json::Value>,
    ) -> bool {
        let Some(tx) = self.pending.lock().await.remove(&request_id) else {
            debug!(request_id, "dropping late bounds response");
            return false;
        };
        let raw = payload.and_then(RawBounds::from_value);
        if raw.is_none() {
            debug!(request_id, "invalid bounds response");
        }
        tx.send(raw).is_ok()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn raw(x: i64, y: i64, width: i64, height: i64) -> RawBounds {
        RawBounds {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn in_range_bounds_pass_through() {
        assert_eq!(clamp_bounds(raw(200, 40, 600, 500), 1000, 800), Bounds {
            x: 200,
            y: 40,
            width: 600,
            height: 500,
        });
    }

    #[test]
    fn negative_origin_and_oversize_are_clamped() {
        assert_eq!(clamp_bounds(raw(-20, -5, 5000, 5000), 1000, 800), Bounds {
            x: 0,
            y: 0,
            width: 1000,
            height: 800,
        });
    }

    #[test]
    fn origin_past_the_edge_keeps_one_pixel() {
        assert_eq!(clamp_bounds(raw(1500, 900, 100, 100), 1000, 800), Bounds {
            x: 999,
            y: 799,
            width: 1,
            height: 1,
        });
    }

    #[test]
    fn size_is_floored_at_one() {
        let b = clamp_bounds(raw(10, 10, 0, -40), 100, 100);
        assert_eq!((b.width, b.height), (1, 1));
    }

    #[test]
    fn zero_sized_window_still_yields_a_pixel() {
        assert_eq!(clamp_bounds(raw(5, 5, 5, 5), 0, 0), Bounds {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        });
    }

    #[test]
    fn raw_bounds_parse() {
        assert_eq!(
            RawBounds::from_value(&json!({"x": 1, "y": 2.4, "width": 3, "height": 4})),
            Some(raw(1, 2, 3, 4))
        );
        assert_eq!(RawBounds::from_value(&json!({"x": 1, "y": 2})), None);
        assert_eq!(
            RawBounds::from_value(&json!({"x": "1", "y": 2, "width": 3, "height": 4})),
            None
        );
        assert_eq!(RawBounds::from_value(&json!(null)), None);
    }
}
