//! Display service — renders snapshots received on a car park's display topic.

use tokio::sync::mpsc;

use smartpark_domain::control::{self, CONTROL_TOPIC};
use smartpark_domain::error::SmartParkError;
use smartpark_domain::snapshot::Snapshot;

use crate::ports::{DisplayRenderer, InboundMessage, Transport};
use crate::services::MessageOutcome;

/// Feeds snapshots from one display topic into a [`DisplayRenderer`].
pub struct DisplayService<R> {
    name: String,
    display_topic: String,
    renderer: R,
    rendered: usize,
}

impl<R: DisplayRenderer> DisplayService<R> {
    pub fn new(name: impl Into<String>, display_topic: impl Into<String>, renderer: R) -> Self {
        Self {
            name: name.into(),
            display_topic: display_topic.into(),
            renderer,
            rendered: 0,
        }
    }

    #[must_use]
    pub fn display_topic(&self) -> &str {
        &self.display_topic
    }

    /// How many snapshots were rendered so far.
    #[must_use]
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Subscribe `transport` to the display topic and the quit topic.
    ///
    /// # Errors
    ///
    /// Returns a transport error when either subscription fails.
    pub async fn subscribe<T: Transport>(&self, transport: &T) -> Result<(), SmartParkError> {
        transport.subscribe(&self.display_topic).await?;
        transport.subscribe(CONTROL_TOPIC).await
    }

    /// Render a snapshot message, or tear the renderer down on quit.
    #[tracing::instrument(skip(self, msg), fields(display = %self.name, topic = %msg.topic))]
    pub fn handle_message(&mut self, msg: &InboundMessage) -> MessageOutcome {
        let payload = match msg.payload_str() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable payload");
                return MessageOutcome::Dropped;
            }
        };

        if msg.topic == CONTROL_TOPIC {
            if control::is_quit(&msg.topic, payload) {
                self.teardown();
                return MessageOutcome::Quit;
            }
            return MessageOutcome::Ignored;
        }
        if msg.topic != self.display_topic {
            return MessageOutcome::Ignored;
        }

        let snapshot = match payload.parse::<Snapshot>() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(payload, error = %err, "dropping malformed snapshot");
                return MessageOutcome::Dropped;
            }
        };
        if let Err(err) = self.renderer.render(&snapshot) {
            tracing::warn!(error = %err, "render failed");
            return MessageOutcome::Dropped;
        }
        self.rendered += 1;
        MessageOutcome::Processed
    }

    /// Render snapshots until a quit request arrives or the channel closes.
    pub async fn run(&mut self, mut inbound: mpsc::Receiver<InboundMessage>) {
        tracing::info!(display = %self.name, topic = %self.display_topic, "display running");
        while let Some(msg) = inbound.recv().await {
            if self.handle_message(&msg) == MessageOutcome::Quit {
                tracing::info!(display = %self.name, rendered = self.rendered, "display stopped");
                return;
            }
        }
        self.teardown();
        tracing::info!(display = %self.name, rendered = self.rendered, "display channel closed");
    }

    fn teardown(&mut self) {
        if let Err(err) = self.renderer.teardown() {
            tracing::warn!(display = %self.name, error = %err, "renderer teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: &str = "carpark1/Moondaloop Park/carpark1/display";

    #[derive(Default)]
    struct MemoryRenderer {
        frames: Vec<Snapshot>,
        torn_down: bool,
        fail: bool,
    }

    impl DisplayRenderer for MemoryRenderer {
        fn render(&mut self, snapshot: &Snapshot) -> Result<(), SmartParkError> {
            if self.fail {
                return Err(SmartParkError::Sink("screen unplugged".into()));
            }
            self.frames.push(snapshot.clone());
            Ok(())
        }

        fn teardown(&mut self) -> Result<(), SmartParkError> {
            self.torn_down = true;
            Ok(())
        }
    }

    fn make_display() -> DisplayService<MemoryRenderer> {
        DisplayService::new("display1", DISPLAY, MemoryRenderer::default())
    }

    #[test]
    fn should_render_snapshot_payload() {
        let mut display = make_display();

        let outcome = display.handle_message(&InboundMessage::new(
            DISPLAY,
            "4;23;2024-01-02 03:04:05;1;1;0",
        ));

        assert_eq!(outcome, MessageOutcome::Processed);
        assert_eq!(display.rendered(), 1);
        let frame = &display.renderer().frames[0];
        assert_eq!(frame.available_bays, 4);
        assert_eq!(frame.total_cars, 1);
    }

    #[test]
    fn should_drop_snapshot_when_field_count_wrong() {
        let mut display = make_display();

        let outcome = display.handle_message(&InboundMessage::new(
            DISPLAY,
            "4;23;2024-01-02 03:04:05",
        ));

        assert_eq!(outcome, MessageOutcome::Dropped);
        assert!(display.renderer().frames.is_empty());
    }

    #[test]
    fn should_ignore_message_when_topic_differs() {
        let mut display = make_display();

        let outcome = display.handle_message(&InboundMessage::new(
            "carpark2/Jandurah Park/carpark2/display",
            "4;23;2024-01-02 03:04:05;1;1;0",
        ));

        assert_eq!(outcome, MessageOutcome::Ignored);
    }

    #[test]
    fn should_drop_snapshot_when_renderer_fails() {
        let mut display = DisplayService::new(
            "display1",
            DISPLAY,
            MemoryRenderer {
                fail: true,
                ..MemoryRenderer::default()
            },
        );

        let outcome = display.handle_message(&InboundMessage::new(
            DISPLAY,
            "4;23;2024-01-02 03:04:05;1;1;0",
        ));

        assert_eq!(outcome, MessageOutcome::Dropped);
        assert_eq!(display.rendered(), 0);
    }

    #[test]
    fn should_tear_down_renderer_when_quit_received() {
        let mut display = make_display();

        let outcome = display.handle_message(&InboundMessage::new("quit", "quit"));

        assert_eq!(outcome, MessageOutcome::Quit);
        assert!(display.renderer().torn_down);
    }

    #[tokio::test]
    async fn should_render_until_quit() {
        let mut display = make_display();
        let (tx, rx) = mpsc::channel(8);
        tx.send(InboundMessage::new(DISPLAY, "5;20;2024-01-02 03:04:05;0;0;0"))
            .await
            .unwrap();
        tx.send(InboundMessage::new(DISPLAY, "4;21;2024-01-02 03:04:06;1;1;0"))
            .await
            .unwrap();
        tx.send(InboundMessage::new("quit", "q")).await.unwrap();
        tx.send(InboundMessage::new(DISPLAY, "3;22;2024-01-02 03:04:07;2;2;0"))
            .await
            .unwrap();

        display.run(rx).await;

        let renderer = display.into_renderer();
        assert_eq!(renderer.frames.len(), 2);
        assert!(renderer.torn_down);
    }

    #[tokio::test]
    async fn should_tear_down_when_channel_closes() {
        let mut display = make_display();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        display.run(rx).await;

        assert!(display.renderer().torn_down);
    }
}
