use chrono::Duration;
use cucumber::given;

use crate::{cucumber::DispatchWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut DispatchWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "courier {string} is {float} km from the delivery point")]
async fn courier_nearby(world: &mut DispatchWorld, name: String, km: f64) {
    let id = 1_000 + world.couriers.len() as i64;
    let courier = world.system().add_courier(id, km).await;
    world.couriers.insert(name, courier);
}

#[given("handoff codes expire immediately")]
async fn codes_expire(world: &mut DispatchWorld) {
    world.system_mut().policy.handoff_code_ttl = Duration::seconds(-1);
}
