use std::time::Duration;

use cucumber::{then, when};
use dispatch_engine::{
    db_types::*,
    events::Channel,
    AssignmentManagement,
    CourierIndex,
    FulfillmentError,
    OrderManagement,
};
use futures_util::future::join_all;

use crate::{
    cucumber::DispatchWorld,
    support::{TestSystem, CUSTOMER, OWNER, SPICE_ROUTE},
};

#[when(
    expr = "the customer orders {int} {string} at {int} rupees and {int} {string} at {int} rupees paying cash"
)]
async fn place_cash_order(
    world: &mut DispatchWorld,
    qty1: i64,
    item1: String,
    price1: i64,
    qty2: i64,
    item2: String,
    price2: i64,
) {
    let new_order = NewOrder::new(PaymentMethod::Cod, TestSystem::home())
        .with_line(TestSystem::cart_line(SPICE_ROUTE, &item1, price1, qty1))
        .with_line(TestSystem::cart_line(SPICE_ROUTE, &item2, price2, qty2));
    let order = world.system().order_flow().place_order(CUSTOMER, new_order).await.expect("Error placing order");
    world.order = Some(order);
}

#[then(expr = "the order total is {int} rupees")]
async fn order_total(world: &mut DispatchWorld, rupees: i64) {
    assert_eq!(world.order().total_amount, Paise::from_rupees(rupees));
}

#[when(expr = "the owner marks the order {string}")]
async fn owner_marks(world: &mut DispatchWorld, status: String) {
    let status = status.parse::<ShopOrderStatus>().expect("Unknown status");
    let order = world.order();
    let (order_id, so) = (order.id, order.shop_orders[0].id);
    let update = world
        .system()
        .order_flow()
        .update_shop_order_status(OWNER, order_id, so, status)
        .await
        .expect("Error updating status");
    if let Some(assignment) = update.dispatch.and_then(|d| d.assignment) {
        world.assignment = Some(assignment);
    }
}

#[then(expr = "the offer is broadcast to {string}")]
async fn broadcast_to(world: &mut DispatchWorld, names: String) {
    let expected = names.split(',').map(|n| world.courier(n.trim())).collect::<Vec<_>>();
    assert_eq!(world.assignment().broadcasted_to, expected);
    for courier in expected {
        assert!(world.system().wait_for_event(Channel::Courier(courier), "delivery:assignment").await);
    }
}

#[when(expr = "{string} accepts the offer")]
async fn accepts(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    let id = world.assignment().id;
    let accepted = world.system().dispatcher().accept(id, courier).await.expect("Error accepting offer");
    world.assignment = Some(accepted.assignment);
}

#[when(expr = "{string} and {string} accept the offer at the same time")]
async fn accept_together(world: &mut DispatchWorld, first: String, second: String) {
    let id = world.assignment().id;
    let names = [first, second];
    let dispatcher = world.system().dispatcher();
    let results = join_all(names.iter().map(|n| dispatcher.accept(id, world.courier(n)))).await;
    world.accept_results =
        names.into_iter().zip(results.into_iter().map(|r| r.map(|a| a.assignment))).collect::<Vec<_>>();
}

#[then("exactly one accept succeeds")]
async fn one_winner(world: &mut DispatchWorld) {
    assert_eq!(world.accept_results.iter().filter(|(_, r)| r.is_ok()).count(), 1);
}

#[then("the other accept fails because the offer is no longer open")]
async fn loser_sees_invalid_state(world: &mut DispatchWorld) {
    let losers = world.accept_results.iter().filter(|(_, r)| r.is_err()).collect::<Vec<_>>();
    assert_eq!(losers.len(), 1);
    assert!(matches!(losers[0].1, Err(FulfillmentError::InvalidState(_))));
}

#[then("the assignment belongs to the winner")]
async fn assignment_belongs_to_winner(world: &mut DispatchWorld) {
    let winner = world.accept_results.iter().find(|(_, r)| r.is_ok()).map(|(n, _)| world.courier(n)).unwrap();
    let stored = world.system().db.fetch_assignment(world.assignment().id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::Assigned);
    assert_eq!(stored.assigned_to, Some(winner));
}

#[then(expr = "the offer is assigned to {string}")]
async fn assigned_to(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    let stored = world.system().db.fetch_assignment(world.assignment().id).await.unwrap().unwrap();
    assert_eq!(stored.status, AssignmentStatus::Assigned);
    assert_eq!(stored.assigned_to, Some(courier));
    let order = world.system().db.fetch_order(world.order().id).await.unwrap().unwrap();
    assert_eq!(order.shop_orders[0].assigned_courier_id, Some(courier));
}

#[then(expr = "{string} is told the offer is closed")]
async fn offer_closed(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    assert!(world.system().wait_for_event(Channel::Courier(courier), "delivery:assignment-closed").await);
}

#[when(expr = "{string} requests a handoff code")]
async fn request_code(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    world.system().handoff().request_code(courier).await.expect("Error requesting code");
}

#[then(expr = "the customer receives a {int}-digit code")]
async fn customer_receives_code(world: &mut DispatchWorld, digits: usize) {
    let code = world.system().wait_for_code("asha@example.com").await.expect("No code was mailed");
    assert_eq!(code.len(), digits);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    world.handoff_code = Some(code);
}

#[when(expr = "{string} confirms the handoff with the customer's code")]
async fn confirm_code(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    let code = world.handoff_code.clone().expect("No code was received");
    match world.system().handoff().confirm(courier, &code).await {
        Ok(confirmed) => world.assignment = Some(confirmed.assignment),
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "the sub-order is {string}")]
async fn sub_order_status(world: &mut DispatchWorld, status: String) {
    let status = status.parse::<ShopOrderStatus>().expect("Unknown status");
    let order = world.system().db.fetch_order(world.order().id).await.unwrap().unwrap();
    assert_eq!(order.shop_orders[0].status, status);
}

#[then(expr = "the assignment is {string}")]
async fn assignment_status(world: &mut DispatchWorld, status: String) {
    let status = status.parse::<AssignmentStatus>().expect("Unknown status");
    let stored = world.system().db.fetch_assignment(world.assignment().id).await.unwrap().unwrap();
    assert_eq!(stored.status, status);
}

#[then(expr = "the assignment is still held by {string}")]
async fn still_held_by(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    let stored = world.system().db.fetch_assignment(world.assignment().id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_to, Some(courier));
}

#[then(expr = "the handoff fails with {string}")]
async fn handoff_fails(world: &mut DispatchWorld, kind: String) {
    let err = world.last_error.take().expect("The handoff did not fail");
    let matched = match kind.as_str() {
        "expired code" => matches!(err, FulfillmentError::ExpiredCode),
        "invalid code" => matches!(err, FulfillmentError::InvalidCode),
        other => panic!("Unknown failure kind {other}"),
    };
    assert!(matched, "Unexpected failure: {err:?}");
}

#[then(expr = "{string} is available for new deliveries")]
async fn available_again(world: &mut DispatchWorld, name: String) {
    let courier = world.courier(&name);
    let busy = world.system().db.busy_couriers(&[courier]).await.unwrap();
    assert!(busy.is_empty());
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut DispatchWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
