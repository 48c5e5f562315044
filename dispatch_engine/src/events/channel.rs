//! Simple stateless pub-sub event handler
//!
//! This module provides a simple hook system that allow components of the system subscribe to fulfillment events
//! and react to them. The event handler is stateless, i.e. the handlers have no access to the internal state of the
//! system. All that is received is the event itself.
//!
//! Handlers can be async. By default each event is handled in its own task. A [sequential](EventHandler::sequential)
//! handler awaits each event before taking the next one, which keeps events in publication order.
use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI64, Arc},
};

use log::*;
use tokio::sync::{mpsc, mpsc::error::TrySendError};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Concurrent,
    Sequential,
}

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
    dispatch: Dispatch,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler, dispatch: Dispatch::Concurrent }
    }

    /// An event handler that processes one event at a time, in the order they were published.
    pub fn sequential(buffer_size: usize, handler: Handler<E>) -> Self {
        Self { dispatch: Dispatch::Sequential, ..Self::new(buffer_size, handler) }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        debug!("📬️ Starting {:?} event handler", self.dispatch);
        // drop the internal sender so that when the last subscriber is dropped, we can automatically shut down the
        // handler
        drop(self.sender);
        if self.dispatch == Dispatch::Sequential {
            while let Some(ev) = self.listener.recv().await {
                (self.handler)(ev).await;
            }
            debug!("📬️ Event handler has shut down");
            return;
        }
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let job = jobs.clone();
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                trace!("📬️ Event handled");
            });
        }
        while jobs.load(std::sync::atomic::Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for jobs to complete");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues the event without waiting. If the handler's buffer is full the event is dropped with a warning, so a
    /// slow handler never holds up the caller.
    pub fn publish_event(&self, event: E) {
        match self.sender.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => warn!("📬️ Event handler is not keeping up. Event dropped"),
            Err(TrySendError::Closed(_)) => error!("📬️ Failed to send event: the handler has shut down"),
        }
    }
}
