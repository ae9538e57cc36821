use crate::domain::models::{Message, SystemNotification};
use crate::infrastructure::error::InfraError;
use tokio::sync::mpsc;

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: SystemNotification) -> Result<(), InfraError>;
}

pub trait MessageSink: Send + Sync {
    fn send(&self, message: Message) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Notification(SystemNotification),
    Message(Message),
}

/// Forwards notifications and outgoing messages to whoever drains the channel.
#[derive(Debug, Clone)]
pub struct ChannelRuntime {
    sender: mpsc::UnboundedSender<RuntimeEvent>,
}

impl ChannelRuntime {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RuntimeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn push(&self, event: RuntimeEvent) -> Result<(), InfraError> {
        self.sender
            .send(event)
            .map_err(|error| InfraError::Channel(format!("runtime receiver dropped: {error}")))
    }
}

impl Notifier for ChannelRuntime {
    fn notify(&self, notification: SystemNotification) -> Result<(), InfraError> {
        self.push(RuntimeEvent::Notification(notification))
    }
}

impl MessageSink for ChannelRuntime {
    fn send(&self, message: Message) -> Result<(), InfraError> {
        self.push(RuntimeEvent::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_send_order() {
        let (runtime, mut receiver) = ChannelRuntime::new();
        runtime
            .notify(SystemNotification {
                title: "Pomodoro".to_string(),
                message: "Back to focus!".to_string(),
            })
            .expect("notify");
        runtime
            .send(Message::AiNudge {
                nudge: "keep going".to_string(),
            })
            .expect("send");

        assert!(matches!(receiver.try_recv(), Ok(RuntimeEvent::Notification(_))));
        assert!(matches!(receiver.try_recv(), Ok(RuntimeEvent::Message(Message::AiNudge { .. }))));
    }

    #[test]
    fn dropped_receiver_is_a_channel_error() {
        let (runtime, receiver) = ChannelRuntime::new();
        drop(receiver);
        assert!(matches!(
            runtime.send(Message::AiMinimalize),
            Err(InfraError::Channel(_))
        ));
    }
}
