//! Statistics component: the external-facing driver
//!
//! [`StatisticsComponent`] subscribes to raw measurements, batches them into
//! chunk aggregates, feeds the chunks into the configured queue backend,
//! bounds the window by evicting, and periodically publishes the derived
//! statistics to a sink. Everything runs synchronously on the calling thread;
//! the component is driven entirely by [`on_new_measurement`]
//! (sensor callback) and [`tick`] (chunk-duration timer callback).
//!
//! [`on_new_measurement`]: StatisticsComponent::on_new_measurement
//! [`tick`]: StatisticsComponent::tick

use std::time::Instant;

use tracing::{debug, warn};

use crate::aggregate::Aggregate;
use crate::config::{StatisticType, StatisticsConfig, WeightType, WindowType};
use crate::error::Result;
use crate::queue::{AggregateQueue, ContinuousQueue, ContinuousSingular, DABALiteQueue};
use crate::snapshot::{decode_aggregate, encode_aggregate, snapshot_key, SnapshotStore};

/// Downstream consumer of published statistic values
pub trait StatisticSink {
    /// Receive one derived statistic for the current window
    fn publish(&mut self, statistic: StatisticType, value: f64);
}

/// Source of timestamps for measurements
///
/// The monotonic counter is expected to wrap; all internal arithmetic on it
/// is wrapping. Unix time is only used for argmin/argmax bookkeeping and the
/// since-extremum statistics.
pub trait Clock {
    /// Wrapping monotonic milliseconds
    fn monotonic_millis(&self) -> u32;

    /// Unix time in seconds
    fn unix_time(&self) -> i64;
}

/// Process clock: monotonic milliseconds since construction, wall clock from
/// the system
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_millis(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn unix_time(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

type UpdateCallback = Box<dyn FnMut(&Aggregate)>;

/// Orchestrator wiring a measurement source to statistic outputs through an
/// aggregate queue
pub struct StatisticsComponent {
    config: StatisticsConfig,
    queue: Box<dyn AggregateQueue>,
    sink: Box<dyn StatisticSink>,
    clock: Box<dyn Clock>,

    snapshot_store: Option<Box<dyn SnapshotStore>>,
    snapshot_key: u32,

    callbacks: Vec<UpdateCallback>,

    running_chunk: Aggregate,
    measurements_in_running_chunk: usize,
    chunks_since_publish: usize,

    previous_value: f64,
    previous_timestamp: Option<u32>,
}

impl StatisticsComponent {
    /// Validate the configuration, build the queue backend for the window
    /// type, and allocate its storage.
    ///
    /// Allocation failure is fatal: the component is never constructed and
    /// the caller must treat the error as a setup failure.
    pub fn new(
        config: StatisticsConfig,
        sink: Box<dyn StatisticSink>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let weight_type = config.calculation.weight_type;
        let mut queue: Box<dyn AggregateQueue> = match config.window.window_type {
            WindowType::Sliding => Box::new(DABALiteQueue::new(weight_type)),
            WindowType::Continuous => Box::new(ContinuousSingular::new(weight_type)),
            WindowType::ContinuousLongTerm => Box::new(ContinuousQueue::new(weight_type)),
        };
        queue.configure(config.window.window_size.unwrap_or(0))?;

        debug!(
            window_type = ?config.window.window_type,
            window_size = ?config.window.window_size,
            chunk_size = ?config.window.chunk_size,
            send_every = ?config.window.send_every,
            "statistics component configured"
        );

        let snapshot_key = snapshot_key(&config.restore.config_id);
        let chunks_since_publish = initial_publish_counter(&config);

        Ok(Self {
            config,
            queue,
            sink,
            clock,
            snapshot_store: None,
            snapshot_key,
            callbacks: Vec::new(),
            running_chunk: Aggregate::identity(),
            measurements_in_running_chunk: 0,
            chunks_since_publish,
            previous_value: f64::NAN,
            previous_timestamp: None,
        })
    }

    /// Attach a snapshot store; when restore is enabled, load the persisted
    /// aggregate into the queue and publish it immediately.
    ///
    /// A missing or undecodable snapshot is not fatal: the component starts
    /// from an empty window and logs the problem.
    pub fn with_snapshot_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        if self.config.restore.enabled {
            match store.load(self.snapshot_key) {
                Ok(Some(bytes)) => match decode_aggregate(&bytes) {
                    Ok(aggregate) => {
                        debug!(
                            key = self.snapshot_key,
                            count = aggregate.count(),
                            "restored aggregate snapshot"
                        );
                        self.queue.insert(aggregate);
                    }
                    Err(err) => {
                        warn!(key = self.snapshot_key, %err, "discarding undecodable snapshot");
                    }
                },
                Ok(None) => debug!(key = self.snapshot_key, "no snapshot to restore"),
                Err(err) => warn!(key = self.snapshot_key, %err, "snapshot load failed"),
            }
        }
        self.snapshot_store = Some(store);

        if self.config.restore.enabled {
            self.force_publish();
        }
        self
    }

    /// Register a callback fired with the combined aggregate on every publish
    /// cycle
    pub fn add_on_update_callback(&mut self, callback: impl FnMut(&Aggregate) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Handle a new raw measurement from the source sensor.
    ///
    /// NaN signals "no reading" and is dropped without advancing any count.
    /// With duration weighting the previous value is the one folded in, since
    /// it is the value that was held for the just-elapsed interval.
    pub fn on_new_measurement(&mut self, value: f64) {
        let now_millis = self.clock.monotonic_millis();
        let now_unix = self.clock.unix_time();

        let duration = match self.previous_timestamp {
            Some(previous) => u64::from(now_millis.wrapping_sub(previous)),
            None => 0,
        };

        let folded_value = match self.config.calculation.weight_type {
            WeightType::Simple => value,
            WeightType::Duration => self.previous_value,
        };

        self.previous_timestamp = Some(now_millis);
        self.previous_value = value;

        if folded_value.is_nan() {
            return;
        }

        let measurement = Aggregate::from_measurement(folded_value, duration, now_millis, now_unix);
        self.running_chunk = self
            .running_chunk
            .combine(&measurement, self.config.calculation.weight_type);
        self.measurements_in_running_chunk += 1;

        if let Some(chunk_size) = self.config.window.chunk_size {
            if self.measurements_in_running_chunk >= chunk_size {
                self.insert_running_chunk();
            }
        }
    }

    /// Chunk-duration trigger: close the running chunk regardless of how many
    /// measurements it holds. Called by the external timer when
    /// `chunk_duration_ms` is configured.
    pub fn tick(&mut self) {
        self.insert_running_chunk();
    }

    /// Publish the current combined statistics immediately, outside the
    /// send-every cadence
    pub fn force_publish(&mut self) {
        let aggregate = self.current_aggregate();
        self.publish_and_save(&aggregate);
    }

    /// Clear the window, the running chunk, and the publish counter
    pub fn reset(&mut self) {
        self.queue.clear();
        self.running_chunk = Aggregate::identity();
        self.measurements_in_running_chunk = 0;
        self.chunks_since_publish = initial_publish_counter(&self.config);
    }

    /// Combined aggregate over the whole current window.
    ///
    /// For continuous window types the running chunk participates as well, so
    /// nothing already measured is missing from the total.
    pub fn current_aggregate(&self) -> Aggregate {
        let aggregate = self.queue.current_aggregate();
        if self.config.window.window_type == WindowType::Sliding {
            aggregate
        } else {
            aggregate.combine(&self.running_chunk, self.config.calculation.weight_type)
        }
    }

    /// Number of chunks currently accounted in the queue
    pub fn window_len(&self) -> usize {
        self.queue.len()
    }

    fn insert_running_chunk(&mut self) {
        self.queue.insert(self.running_chunk);
        self.chunks_since_publish += 1;

        self.running_chunk = Aggregate::identity();
        self.measurements_in_running_chunk = 0;

        // Evict before publishing so the published aggregate covers exactly
        // the window_size most recent chunks.
        if let Some(window_size) = self.config.window.window_size {
            while self.queue.len() > window_size {
                self.queue.evict();
            }
        }

        if let Some(send_every) = self.config.window.send_every {
            if self.chunks_since_publish >= send_every {
                self.chunks_since_publish = 0;
                let aggregate = self.queue.current_aggregate();
                self.publish_and_save(&aggregate);
            }
        }
    }

    fn publish_and_save(&mut self, aggregate: &Aggregate) {
        // Nothing measured yet; consumers would only see NaN placeholders.
        if aggregate.count() == 0 {
            return;
        }

        let calculation = self.config.calculation;
        let now_unix = self.clock.unix_time();

        debug!(
            count = aggregate.count(),
            mean = aggregate.mean(),
            "publishing statistics"
        );

        for statistic in &self.config.statistics {
            let value = match statistic {
                StatisticType::Count => aggregate.count() as f64,
                StatisticType::Duration => aggregate.duration() as f64,
                StatisticType::Min => aggregate.min(),
                StatisticType::Max => aggregate.max(),
                StatisticType::Mean => aggregate.mean(),
                StatisticType::Quadrature => aggregate.quadrature(),
                StatisticType::SinceArgmax => (now_unix - aggregate.argmax()) as f64,
                StatisticType::SinceArgmin => (now_unix - aggregate.argmin()) as f64,
                StatisticType::StdDev => {
                    aggregate.std_dev(calculation.weight_type, calculation.group_type)
                }
                StatisticType::Trend => aggregate.trend(),
            };
            self.sink.publish(*statistic, value);
        }

        if self.config.restore.enabled {
            if let Some(store) = self.snapshot_store.as_mut() {
                let saved = encode_aggregate(aggregate)
                    .and_then(|bytes| store.save(self.snapshot_key, &bytes));
                if let Err(err) = saved {
                    warn!(key = self.snapshot_key, %err, "snapshot save failed");
                }
            }
        }

        for callback in &mut self.callbacks {
            callback(aggregate);
        }
    }
}

/// Starting value of the publish counter so the first publish lands after
/// `send_first_at` chunks (or a full `send_every` cycle when unset).
fn initial_publish_counter(config: &StatisticsConfig) -> usize {
    match config.window.send_every {
        Some(send_every) if config.window.send_first_at > 0 => {
            send_every - config.window.send_first_at
        }
        _ => 0,
    }
}
