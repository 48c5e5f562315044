use log::*;

use crate::{
    db_types::{Order, ShopOrder, UserId},
    events::{
        AssignmentClosedPayload,
        AssignmentOffer,
        Channel,
        EventProducers,
        LocationPayload,
        NotificationRequest,
        OrderStatusPayload,
        RealtimeEvent,
        RealtimeMessage,
        RefreshHint,
        RefreshScope,
    },
};

/// The fan-out capability handed to every engine API. It is built once, from the producers of the registered hooks,
/// and knows which channels each kind of state change is addressed to.
///
/// Publishing never fails the caller. A publisher with no producers silently drops everything.
#[derive(Default, Clone)]
pub struct Publisher {
    producers: EventProducers,
}

impl Publisher {
    pub fn new(producers: EventProducers) -> Self {
        Self { producers }
    }

    pub async fn publish(&self, channel: Channel, message: RealtimeMessage) {
        trace!("📬️ {} -> {channel}", message.event_name());
        for producer in &self.producers.realtime_producer {
            producer.publish_event(RealtimeEvent::new(channel, message.clone()));
        }
    }

    pub async fn notify(&self, request: NotificationRequest) {
        trace!("📬️ Queueing {:?} notification", request.template);
        for producer in &self.producers.notification_producer {
            producer.publish_event(request.clone());
        }
    }

    /// Order placement: every party gets a refresh hint.
    pub async fn order_placed(&self, order: &Order) {
        self.refresh_customer(order).await;
        for owner_id in order.owner_ids() {
            self.refresh_owner(order, owner_id).await;
        }
    }

    /// Publishes the full sub-order view to the order, customer, owner and courier channels, followed by a refresh
    /// hint for each role.
    ///
    /// `courier` names a courier to notify in addition to the one currently recorded on the sub-order. Completion
    /// uses it, since the sub-order no longer references the courier that delivered it.
    pub async fn shop_order_changed(&self, order: &Order, shop_order: &ShopOrder, courier: Option<UserId>) {
        let payload = OrderStatusPayload {
            order_id: order.id,
            shop_order_id: shop_order.id,
            status: shop_order.status,
            assignment_id: shop_order.assignment_id,
            assigned_delivery_boy: shop_order.assigned_courier_id,
            user_id: order.customer_id,
            owner_id: shop_order.owner_id,
            message: shop_order.status.message().to_string(),
            shop_order: shop_order.clone(),
        };
        let courier = courier.or(shop_order.assigned_courier_id);
        let mut channels =
            vec![Channel::Order(order.id), Channel::Customer(order.customer_id), Channel::Owner(shop_order.owner_id)];
        channels.extend(courier.map(Channel::Courier));
        debug!("📬️ Shop order #{} is {}. Notifying {} channels", shop_order.id, shop_order.status, channels.len());
        for channel in channels {
            self.publish(channel, RealtimeMessage::OrderStatus(Box::new(payload.clone()))).await;
        }
        self.refresh_customer(order).await;
        self.refresh_owner(order, shop_order.owner_id).await;
        if let Some(courier_id) = courier {
            self.refresh_courier(order, courier_id).await;
        }
    }

    pub async fn assignment_offered(&self, candidates: &[UserId], offer: &AssignmentOffer) {
        debug!("📬️ Offering assignment #{} to {} couriers", offer.assignment_id, candidates.len());
        for courier_id in candidates {
            self.publish(Channel::Courier(*courier_id), RealtimeMessage::Assignment(offer.clone())).await;
        }
    }

    pub async fn assignment_closed(&self, couriers: &[UserId], closed: AssignmentClosedPayload) {
        debug!("📬️ Closing assignment #{} for {} couriers", closed.assignment_id, couriers.len());
        for courier_id in couriers {
            self.publish(Channel::Courier(*courier_id), RealtimeMessage::AssignmentClosed(closed.clone())).await;
        }
    }

    pub async fn courier_moved(&self, customer_id: UserId, owner_id: UserId, location: LocationPayload) {
        let channels = [
            Channel::Order(location.order_id),
            Channel::Customer(customer_id),
            Channel::Owner(owner_id),
            Channel::Courier(location.delivery_boy_id),
        ];
        for channel in channels {
            self.publish(channel, RealtimeMessage::Location(location.clone())).await;
        }
    }

    async fn refresh_customer(&self, order: &Order) {
        let hint =
            RefreshHint { scope: RefreshScope::User, order_id: order.id, user_id: Some(order.customer_id), owner_id: None };
        self.publish(Channel::Customer(order.customer_id), RealtimeMessage::OrdersRefresh(hint)).await;
    }

    async fn refresh_owner(&self, order: &Order, owner_id: UserId) {
        let hint = RefreshHint { scope: RefreshScope::Owner, order_id: order.id, user_id: None, owner_id: Some(owner_id) };
        self.publish(Channel::Owner(owner_id), RealtimeMessage::OrdersRefresh(hint)).await;
    }

    async fn refresh_courier(&self, order: &Order, courier_id: UserId) {
        let hint = RefreshHint { scope: RefreshScope::Delivery, order_id: order.id, user_id: None, owner_id: None };
        self.publish(Channel::Courier(courier_id), RealtimeMessage::OrdersRefresh(hint)).await;
    }
}
