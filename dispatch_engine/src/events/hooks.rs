use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, NotificationRequest, RealtimeEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub realtime_producer: Vec<EventProducer<RealtimeEvent>>,
    pub notification_producer: Vec<EventProducer<NotificationRequest>>,
}

pub struct EventHandlers {
    pub on_realtime: Option<EventHandler<RealtimeEvent>>,
    pub on_notification: Option<EventHandler<NotificationRequest>>,
}

impl EventHandlers {
    /// Real-time events are handled in publication order. Notifications are independent of one another and are
    /// handled concurrently.
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_realtime = hooks.on_realtime.map(|f| EventHandler::sequential(buffer_size, f));
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        Self { on_realtime, on_notification }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_realtime {
            result.realtime_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_realtime {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_notification {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_realtime: Option<Handler<RealtimeEvent>>,
    pub on_notification: Option<Handler<NotificationRequest>>,
}

impl EventHooks {
    pub fn on_realtime<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RealtimeEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_realtime = Some(Arc::new(f));
        self
    }

    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NotificationRequest) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }
}
