use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use dispatch_engine::{
    db_types::{DeliveryAssignment, Order, UserId},
    FulfillmentError,
};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct DispatchWorld {
    pub system: Option<TestSystem>,
    pub couriers: HashMap<String, UserId>,
    pub order: Option<Order>,
    pub assignment: Option<DeliveryAssignment>,
    pub accept_results: Vec<(String, Result<DeliveryAssignment, FulfillmentError>)>,
    pub handoff_code: Option<String>,
    pub last_error: Option<FulfillmentError>,
}

impl Debug for DispatchWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWorld")
            .field("couriers", &self.couriers)
            .field("order", &self.order.as_ref().map(|o| o.id))
            .field("assignment", &self.assignment.as_ref().map(|a| a.id))
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl DispatchWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("System not initialised")
    }

    pub fn system_mut(&mut self) -> &mut TestSystem {
        self.system.as_mut().expect("System not initialised")
    }

    pub fn courier(&self, name: &str) -> UserId {
        *self.couriers.get(name).unwrap_or_else(|| panic!("No courier called {name}"))
    }

    pub fn courier_name(&self, id: UserId) -> String {
        self.couriers.iter().find(|(_, v)| **v == id).map(|(k, _)| k.clone()).unwrap_or_else(|| id.to_string())
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed")
    }

    pub fn assignment(&self) -> &DeliveryAssignment {
        self.assignment.as_ref().expect("The order has not been dispatched")
    }
}
