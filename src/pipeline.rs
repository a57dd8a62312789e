//! Read ➜ decode ➜ encode ➜ publish loop
//!
//! The driver is a typestate machine:
//!
//! ```text
//! Idle ──start()──► Running ──run()──► Terminated
//! ```
//!
//! `run` never returns while both the source and the publisher keep working.
//! The first read or publish failure ends it, and the `Terminated` pipeline
//! carries the error plus counters for the final report. Restarting is left to
//! whoever supervises the process.

use std::io::Write;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::joystick::{decode, EventSource, ReaderError};
use crate::mqtt::{encode, PayloadError, PublishError, PublishTarget, Publisher};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Cannot read joystick events: {0}")]
    Read(#[from] ReaderError),

    #[error("Cannot encode joystick event: {0}")]
    Encode(#[from] PayloadError),

    #[error("Cannot publish joystick event: {0}")]
    Publish(#[from] PublishError),

    #[error("Publisher is not ready")]
    NotReady,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_read: u64,
    pub events_ignored: u64,
    pub events_published: u64,
}

pub struct Idle;

pub struct Running;

pub struct Terminated {
    reason: PipelineError,
}

pub struct Pipeline<Src, Pub, S> {
    source: Src,
    publisher: Pub,
    target: PublishTarget,
    echo: Option<Box<dyn Write + Send>>,
    stats: PipelineStats,
    state: S,
}

impl<Src, Pub, S> Pipeline<Src, Pub, S> {
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn transition<T>(self, state: T) -> Pipeline<Src, Pub, T> {
        Pipeline {
            source: self.source,
            publisher: self.publisher,
            target: self.target,
            echo: self.echo,
            stats: self.stats,
            state,
        }
    }
}

impl<Src: EventSource, Pub: Publisher> Pipeline<Src, Pub, Idle> {
    /// Wire an opened source to a publisher.
    ///
    /// With `config.debug` set every payload is also written to stdout.
    pub fn new(config: &Config, source: Src, publisher: Pub) -> Self {
        let echo: Option<Box<dyn Write + Send>> = if config.debug {
            Some(Box::new(std::io::stdout()))
        } else {
            None
        };

        Self {
            source,
            publisher,
            target: config.mqtt.publish_target(),
            echo,
            stats: PipelineStats::default(),
            state: Idle,
        }
    }

    /// Replace the debug echo sink
    pub fn with_echo(mut self, sink: Option<Box<dyn Write + Send>>) -> Self {
        self.echo = sink;
        self
    }

    pub fn start(self) -> Result<Pipeline<Src, Pub, Running>, PipelineError> {
        if !self.publisher.is_ready() {
            return Err(PipelineError::NotReady);
        }

        info!("Publishing joystick events on {}", self.target.topic());
        Ok(self.transition(Running))
    }
}

impl<Src: EventSource, Pub: Publisher> Pipeline<Src, Pub, Running> {
    /// Process events until something fails
    pub async fn run(mut self) -> Pipeline<Src, Pub, Terminated> {
        let reason = loop {
            if let Err(e) = self.step().await {
                break e;
            }
        };

        error!("Pipeline stopped: {}", reason);
        self.transition(Terminated { reason })
    }

    /// Handle exactly one record
    async fn step(&mut self) -> Result<(), PipelineError> {
        let raw = self.source.next_record().await?;
        self.stats.records_read += 1;

        let Some(event) = decode(&raw) else {
            debug!("Ignoring record with type {:#04x}", raw.event_type);
            self.stats.events_ignored += 1;
            return Ok(());
        };
        if raw.is_init() {
            debug!("Initial state of {:?} {}: {}", event.kind, event.index, event.value);
        }

        let payload = encode(&event)?;

        if let Some(sink) = self.echo.as_mut() {
            if let Err(e) = writeln!(sink, "{}", payload).and_then(|_| sink.flush()) {
                warn!("Failed to echo payload: {}", e);
            }
        }

        self.publisher.publish(&self.target, &payload).await?;
        self.stats.events_published += 1;
        debug!("Published {}", payload);

        Ok(())
    }
}

impl<Src, Pub> Pipeline<Src, Pub, Terminated> {
    pub fn reason(&self) -> &PipelineError {
        &self.state.reason
    }

    pub fn into_error(self) -> PipelineError {
        self.state.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::event::{JS_EVENT_AXIS, JS_EVENT_BUTTON, JS_EVENT_INIT};
    use crate::joystick::RawEvent;
    use crate::mqtt::Payload;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays a fixed list of reads, then reports the device as closed
    struct ScriptedSource {
        reads: VecDeque<Result<RawEvent, ReaderError>>,
        calls: usize,
    }

    impl ScriptedSource {
        fn new(reads: Vec<Result<RawEvent, ReaderError>>) -> Self {
            Self {
                reads: reads.into(),
                calls: 0,
            }
        }
    }

    impl EventSource for ScriptedSource {
        async fn next_record(&mut self) -> Result<RawEvent, ReaderError> {
            self.calls += 1;
            self.reads.pop_front().unwrap_or(Err(ReaderError::Closed))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Vec<(String, String)>,
        attempts: usize,
        fail_on_attempt: Option<usize>,
        not_ready: bool,
    }

    impl Publisher for RecordingPublisher {
        fn is_ready(&self) -> bool {
            !self.not_ready
        }

        async fn publish(
            &mut self,
            target: &PublishTarget,
            payload: &Payload,
        ) -> Result<(), PublishError> {
            self.attempts += 1;
            if self.fail_on_attempt == Some(self.attempts) {
                return Err(PublishError::NotRunning);
            }
            self.sent
                .push((target.topic().to_string(), payload.to_string()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn record(time: u32, value: i16, event_type: u8, number: u8) -> RawEvent {
        RawEvent {
            time,
            value,
            event_type,
            number,
        }
    }

    async fn run_to_end(
        config: &Config,
        source: ScriptedSource,
        publisher: RecordingPublisher,
    ) -> Pipeline<ScriptedSource, RecordingPublisher, Terminated> {
        Pipeline::new(config, source, publisher)
            .start()
            .unwrap()
            .run()
            .await
    }

    #[tokio::test]
    async fn publishes_axis_event() {
        let source = ScriptedSource::new(vec![Ok(record(1000, 500, JS_EVENT_AXIS, 0))]);
        let done = run_to_end(&Config::default(), source, RecordingPublisher::default()).await;

        assert_eq!(
            done.publisher.sent,
            vec![(
                "/joystick".to_string(),
                r#"{"time":1000,"value":500,"type":"axis","number":0}"#.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn publishes_button_event_on_configured_topic() {
        let mut config = Config::default();
        config.mqtt.topic = "home/pad".to_string();
        let source = ScriptedSource::new(vec![Ok(record(2000, 1, JS_EVENT_BUTTON, 5))]);
        let done = run_to_end(&config, source, RecordingPublisher::default()).await;

        assert_eq!(
            done.publisher.sent,
            vec![(
                "home/pad".to_string(),
                r#"{"time":2000,"value":1,"type":"button","number":5}"#.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn records_without_a_kind_are_skipped() {
        let source = ScriptedSource::new(vec![
            Ok(record(10, 0, JS_EVENT_INIT, 0)),
            Ok(record(11, 0, 0x40, 1)),
            Ok(record(12, 1, JS_EVENT_BUTTON, 0)),
        ]);
        let done = run_to_end(&Config::default(), source, RecordingPublisher::default()).await;

        assert_eq!(done.publisher.attempts, 1);
        assert_eq!(done.source.calls, 4);
        assert!(matches!(
            done.reason(),
            PipelineError::Read(ReaderError::Closed)
        ));
        assert_eq!(
            done.stats(),
            PipelineStats {
                records_read: 3,
                events_ignored: 2,
                events_published: 1,
            }
        );
    }

    #[tokio::test]
    async fn read_failure_stops_after_earlier_events() {
        let source = ScriptedSource::new(vec![
            Ok(record(1, 100, JS_EVENT_AXIS, 0)),
            Ok(record(2, 1, JS_EVENT_BUTTON, 1)),
            Err(ReaderError::ShortRead {
                expected: RawEvent::SIZE,
                actual: 3,
            }),
            Ok(record(3, 0, JS_EVENT_BUTTON, 1)),
        ]);
        let done = run_to_end(&Config::default(), source, RecordingPublisher::default()).await;

        assert_eq!(done.publisher.attempts, 2);
        assert_eq!(done.source.calls, 3);
        assert!(matches!(
            done.into_error(),
            PipelineError::Read(ReaderError::ShortRead { actual: 3, .. })
        ));
    }

    #[tokio::test]
    async fn publish_failure_stops_without_resending() {
        let source = ScriptedSource::new(vec![
            Ok(record(1, 100, JS_EVENT_AXIS, 0)),
            Ok(record(2, 200, JS_EVENT_AXIS, 0)),
            Ok(record(3, 300, JS_EVENT_AXIS, 0)),
        ]);
        let publisher = RecordingPublisher {
            fail_on_attempt: Some(2),
            ..RecordingPublisher::default()
        };
        let done = run_to_end(&Config::default(), source, publisher).await;

        assert_eq!(done.publisher.attempts, 2);
        assert_eq!(done.publisher.sent.len(), 1);
        assert_eq!(done.source.calls, 2);
        assert_eq!(done.stats().events_published, 1);
        assert!(matches!(done.reason(), PipelineError::Publish(_)));
    }

    #[tokio::test]
    async fn events_are_published_in_read_order() {
        let reads = (0..20u32)
            .map(|i| Ok(record(i, i as i16, JS_EVENT_AXIS, (i % 4) as u8)))
            .collect();
        let done = run_to_end(
            &Config::default(),
            ScriptedSource::new(reads),
            RecordingPublisher::default(),
        )
        .await;

        let times: Vec<u32> = done
            .publisher
            .sent
            .iter()
            .map(|(_, payload)| {
                let value: serde_json::Value = serde_json::from_str(payload).unwrap();
                value["time"].as_u64().unwrap() as u32
            })
            .collect();
        assert_eq!(times, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn debug_echo_writes_one_line_per_published_event() {
        let sink = SharedSink::default();
        let source = ScriptedSource::new(vec![
            Ok(record(1000, 500, JS_EVENT_AXIS, 0)),
            Ok(record(5, 0, JS_EVENT_INIT, 0)),
            Ok(record(2000, 1, JS_EVENT_BUTTON, 5)),
        ]);
        let _done = Pipeline::new(&Config::default(), source, RecordingPublisher::default())
            .with_echo(Some(Box::new(sink.clone())))
            .start()
            .unwrap()
            .run()
            .await;

        let echoed = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            echoed,
            concat!(
                r#"{"time":1000,"value":500,"type":"axis","number":0}"#,
                "\n",
                r#"{"time":2000,"value":1,"type":"button","number":5}"#,
                "\n",
            )
        );
    }

    #[test]
    fn start_requires_a_ready_publisher() {
        let publisher = RecordingPublisher {
            not_ready: true,
            ..RecordingPublisher::default()
        };
        let result = Pipeline::new(&Config::default(), ScriptedSource::new(vec![]), publisher).start();

        assert!(matches!(result, Err(PipelineError::NotReady)));
    }
}
